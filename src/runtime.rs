//! Runtime support appended to every generated program, plus the encoding of
//! string literals into the data section.
//!
//! Register contracts:
//! - `helium_itoa`: `rdi` = signed value in; `rax` = pointer, `rdx` = length
//!   out. The digits live in a static buffer that the next call overwrites.
//!   Preserves `rbx`, `r8` and `r9`.
//! - `helium_concat`: `rdi`/`rsi` = left pointer/length, `rdx`/`rcx` = right
//!   pointer/length; `rax` = pointer, `rdx` = length out. Memory comes from
//!   bumping the program break and is never returned.

pub const ITOA: &str = "helium_itoa";
pub const CONCAT: &str = "helium_concat";

/// Size of the decimal conversion buffer; enough for `i64::MIN` and its sign.
const ITOA_BUFFER_LEN: usize = 32;

/// Translate the escapes the language defines (`\n \t \r \" \\`) and copy
/// every other byte as-is.
pub fn decode_literal(raw: &str) -> Vec<u8> {
  let bytes = raw.as_bytes();
  let mut out = Vec::with_capacity(bytes.len());
  let mut i = 0;
  while i < bytes.len() {
    let escaped = match (bytes[i], bytes.get(i + 1)) {
      (b'\\', Some(b'n')) => Some(b'\n'),
      (b'\\', Some(b't')) => Some(b'\t'),
      (b'\\', Some(b'r')) => Some(b'\r'),
      (b'\\', Some(b'"')) => Some(b'"'),
      (b'\\', Some(b'\\')) => Some(b'\\'),
      _ => None,
    };
    match escaped {
      Some(byte) => {
        out.push(byte);
        i += 2;
      }
      None => {
        out.push(bytes[i]);
        i += 1;
      }
    }
  }
  out
}

/// Render bytes as NASM `db` operands: printable runs are quoted, everything
/// else is spliced in as a decimal byte value. A terminating zero is appended.
pub fn db_operands(bytes: &[u8]) -> String {
  let mut parts: Vec<String> = Vec::new();
  let mut run = String::new();

  for &byte in bytes {
    if (0x20..0x7f).contains(&byte) && byte != b'"' {
      run.push(byte as char);
    } else {
      if !run.is_empty() {
        parts.push(format!("\"{run}\""));
        run.clear();
      }
      parts.push(byte.to_string());
    }
  }
  if !run.is_empty() {
    parts.push(format!("\"{run}\""));
  }
  parts.push("0".to_string());

  parts.join(", ")
}

/// `section .data` holding every registered literal, or nothing if there are none.
pub fn data_section(literals: &[(String, Vec<u8>)]) -> String {
  if literals.is_empty() {
    return String::new();
  }
  let mut asm = String::from("section .data\n");
  for (label, bytes) in literals {
    asm.push_str(&format!("{label}: db {}\n", db_operands(bytes)));
  }
  asm
}

/// Uninitialised storage the routines rely on, followed by the routines.
pub fn routines() -> String {
  let mut asm = String::new();
  asm.push_str("section .bss\n");
  asm.push_str(&format!("{ITOA}_buffer: resb {ITOA_BUFFER_LEN}\n"));
  asm.push_str("helium_heap_top: resq 1\n");
  asm.push_str("section .text\n");
  asm.push_str(&itoa_routine());
  asm.push_str(&concat_routine());
  asm
}

fn itoa_routine() -> String {
  let end = format!("[rel {ITOA}_buffer + {ITOA_BUFFER_LEN}]");
  let mut asm = String::new();
  asm.push_str(&format!("{ITOA}:\n"));
  asm.push_str("    mov rax, rdi\n");
  asm.push_str(&format!("    lea rsi, {end}\n"));
  asm.push_str("    xor r10, r10\n");
  asm.push_str("    test rax, rax\n");
  asm.push_str("    jns .digits\n");
  asm.push_str("    neg rax\n");
  asm.push_str("    mov r10, 1\n");
  asm.push_str(".digits:\n");
  asm.push_str("    mov rcx, 10\n");
  asm.push_str(".next_digit:\n");
  asm.push_str("    xor rdx, rdx\n");
  asm.push_str("    div rcx\n");
  asm.push_str("    add dl, '0'\n");
  asm.push_str("    dec rsi\n");
  asm.push_str("    mov [rsi], dl\n");
  asm.push_str("    test rax, rax\n");
  asm.push_str("    jnz .next_digit\n");
  asm.push_str("    test r10, r10\n");
  asm.push_str("    jz .done\n");
  asm.push_str("    dec rsi\n");
  asm.push_str("    mov byte [rsi], '-'\n");
  asm.push_str(".done:\n");
  asm.push_str(&format!("    lea rdx, {end}\n"));
  asm.push_str("    sub rdx, rsi\n");
  asm.push_str("    mov rax, rsi\n");
  asm.push_str("    ret\n");
  asm
}

fn concat_routine() -> String {
  // Saved arguments once pushed: [rsp] right len, [rsp+8] right ptr,
  // [rsp+16] left len, [rsp+24] left ptr.
  let mut asm = String::new();
  asm.push_str(&format!("{CONCAT}:\n"));
  asm.push_str("    push rdi\n");
  asm.push_str("    push rsi\n");
  asm.push_str("    push rdx\n");
  asm.push_str("    push rcx\n");
  asm.push_str("    mov rax, [rel helium_heap_top]\n");
  asm.push_str("    test rax, rax\n");
  asm.push_str("    jnz .grow\n");
  asm.push_str("    mov rax, 12\n");
  asm.push_str("    xor rdi, rdi\n");
  asm.push_str("    syscall\n");
  asm.push_str("    mov [rel helium_heap_top], rax\n");
  asm.push_str(".grow:\n");
  asm.push_str("    mov rdi, [rel helium_heap_top]\n");
  asm.push_str("    add rdi, [rsp + 16]\n");
  asm.push_str("    add rdi, [rsp]\n");
  asm.push_str("    mov r10, rdi\n");
  asm.push_str("    mov rax, 12\n");
  asm.push_str("    syscall\n");
  asm.push_str("    cmp rax, r10\n");
  asm.push_str("    jb .out_of_memory\n");
  asm.push_str("    mov rdi, [rel helium_heap_top]\n");
  asm.push_str("    mov [rel helium_heap_top], rax\n");
  asm.push_str("    mov r10, rdi\n");
  asm.push_str("    cld\n");
  asm.push_str("    mov rsi, [rsp + 24]\n");
  asm.push_str("    mov rcx, [rsp + 16]\n");
  asm.push_str("    rep movsb\n");
  asm.push_str("    mov rsi, [rsp + 8]\n");
  asm.push_str("    mov rcx, [rsp]\n");
  asm.push_str("    rep movsb\n");
  asm.push_str("    mov rdx, [rsp + 16]\n");
  asm.push_str("    add rdx, [rsp]\n");
  asm.push_str("    mov rax, r10\n");
  asm.push_str("    add rsp, 32\n");
  asm.push_str("    ret\n");
  asm.push_str(".out_of_memory:\n");
  asm.push_str("    mov rax, 60\n");
  asm.push_str("    mov rdi, 1\n");
  asm.push_str("    syscall\n");
  asm
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn known_escapes_are_translated() {
    assert_eq!(decode_literal(r#"a\nb\tc\rd\"e\\f"#), b"a\nb\tc\rd\"e\\f");
  }

  #[test]
  fn unknown_escapes_are_kept_verbatim() {
    assert_eq!(decode_literal(r"\q\"), b"\\q\\");
  }

  #[test]
  fn db_splices_quoted_runs_and_byte_values() {
    assert_eq!(db_operands(b"hi\n"), "\"hi\", 10, 0");
    assert_eq!(db_operands(b"say \"x\""), "\"say \", 34, \"x\", 34, 0");
    assert_eq!(db_operands(b""), "0");
  }

  #[test]
  fn non_ascii_bytes_become_numbers() {
    assert_eq!(db_operands("é".as_bytes()), "195, 169, 0");
  }

  #[test]
  fn data_section_is_omitted_without_literals() {
    assert_eq!(data_section(&[]), "");
    let section = data_section(&[("str_0".to_string(), b"ok".to_vec())]);
    assert_eq!(section, "section .data\nstr_0: db \"ok\", 0\n");
  }

  #[test]
  fn routines_define_both_entry_points() {
    let asm = routines();
    assert!(asm.contains("helium_itoa:\n"));
    assert!(asm.contains("helium_concat:\n"));
    assert!(asm.contains("section .bss\n"));
  }
}
