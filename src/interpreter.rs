//! The interpreter: the main dispatch loop over a bytecode program,
//! resolving declarations against an input byte stream and rendering each
//! declaration as its body closes (spec.md §4.3, §4.6).

use std::io::{self, Read, Write};

use crate::bytecode::{ArgMask, ArgPayload, ArgTag, DeclKind, Opcode, Visual, Walker};
use crate::declaration::DeclarationTable;
use crate::error::{FspecError, FspecResult};
use crate::filter::{FilterArg, FilterRegistry};
use crate::render;

/// The byte-stream source an interpreter reads from. Short reads are a
/// clean end-of-input signal, never an error (spec.md §7).
struct Reader<'a> {
    inner: &'a mut dyn Read,
    eof: bool,
}

impl<'a> Reader<'a> {
    fn new(inner: &'a mut dyn Read) -> Self {
        Reader { inner, eof: false }
    }

    /// Reads up to `nmemb` elements of `element_size` bytes each. Returns
    /// the bytes actually read and how many whole elements that amounts to.
    fn read_elements(&mut self, element_size: usize, nmemb: usize) -> io::Result<(Vec<u8>, usize)> {
        if self.eof || element_size == 0 || nmemb == 0 {
            return Ok((Vec::new(), 0));
        }

        let want = element_size * nmemb;
        let mut buf = vec![0u8; want];
        let mut total = 0;
        while total < want {
            match self.inner.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        let got_elems = total / element_size;
        if got_elems < nmemb {
            self.eof = true;
        }
        buf.truncate(got_elems * element_size);
        Ok((buf, got_elems))
    }

    fn is_eof(&self) -> bool {
        self.eof
    }
}

/// Executes one compiled program against one input stream, writing the
/// renderer's text output to `out`.
pub struct Interpreter<'a> {
    bytecode: &'a [u8],
    table: DeclarationTable,
    filters: FilterRegistry,
    reader: Reader<'a>,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        bytecode: &'a [u8],
        table: DeclarationTable,
        filters: FilterRegistry,
        input: &'a mut dyn Read,
    ) -> Self {
        Interpreter {
            bytecode,
            table,
            filters,
            reader: Reader::new(input),
        }
    }

    /// Runs the program to completion, starting at the entry `STRUCT`
    /// declaration's body (spec.md §4.2's "entry point").
    pub fn run(&mut self, out: &mut dyn Write) -> FspecResult<()> {
        let entry = self.table.get(self.table.entry)?;
        let (start, end) = (entry.start, entry.end);
        self.run_body(start, end, out)
    }

    /// Executes `bytecode[start..end)` under the "current declaration"
    /// state machine (spec.md §4.6).
    fn run_body(&mut self, start: usize, end: usize, out: &mut dyn Write) -> FspecResult<()> {
        let mut current: Option<u16> = None;
        let mut op_opt = Some(start);

        while let Some(op) = op_opt {
            if op >= end {
                break;
            }

            if let Some(id) = current {
                if self.table.get(id)?.end == op {
                    self.render_decl(id, out)?;
                    current = None;
                }
            }

            match Opcode::from_u8(self.bytecode[op])? {
                Opcode::Header => {}
                Opcode::Declaration => {
                    let id = self.decl_id_at(op, end)?;
                    current = Some(id);
                    let decl = self.table.get_mut(id)?;
                    decl.buffer.clear();
                    decl.nmemb = 0;
                }
                Opcode::Read => self.exec_read(op, end, current)?,
                Opcode::Goto => self.exec_goto(op, end, &mut current, out)?,
                Opcode::Filter => self.exec_filter(op, end, current)?,
                Opcode::Visual => self.exec_visual(op, end, current)?,
                Opcode::Arg => unreachable!("walker never returns ARG with skip_args=true"),
            }

            op_opt = Walker::next_op(self.bytecode, op, end, true)?;
        }

        if let Some(id) = current {
            if self.table.get(id)?.end == end {
                self.render_decl(id, out)?;
            }
        }

        Ok(())
    }

    fn render_decl(&self, id: u16, out: &mut dyn Write) -> FspecResult<()> {
        let decl = self.table.get(id)?;
        if let Some(line) = render::render(decl) {
            writeln!(out, "{line}").map_err(FspecError::Io)?;
        }
        Ok(())
    }

    fn decl_id_at(&self, op: usize, end: usize) -> FspecResult<u16> {
        let id_arg = Walker::op_get_arg(self.bytecode, op, end, 2, ArgMask::NUM)?
            .ok_or(FspecError::MissingArgument { offset: op, nth: 2 })?;
        Ok(id_arg.as_num().unwrap_or(0) as u16)
    }

    /// Resolves a `VAR` argument's referenced declaration as a number
    /// (spec.md §4.3 "Variable resolution"), clamped to the native width
    /// by construction (`Declaration::as_number` only reads `element_size`
    /// bytes of the buffer).
    fn resolve_var_number(&self, id: u16) -> FspecResult<u64> {
        Ok(self.table.get(id)?.as_number())
    }

    fn exec_read(&mut self, op: usize, end: usize, current: Option<u16>) -> FspecResult<()> {
        let id = current.ok_or(FspecError::ReadOutsideDeclaration)?;

        let width_arg = Walker::op_get_arg(self.bytecode, op, end, 1, ArgMask::NUM)?
            .ok_or(FspecError::MissingArgument { offset: op, nth: 1 })?;
        let width_encoded = width_arg.as_num().unwrap_or(8);
        let bits = width_encoded & 0xff;
        let signed = width_encoded & 0x100 != 0;
        let element_size = ((bits / 8).max(1)) as usize;

        self.table.get_mut(id)?.element_size = element_size;
        self.table.get_mut(id)?.signed = signed;

        let mask = ArgMask::NUM | ArgMask::VAR | ArgMask::STR | ArgMask::EOF;
        let mut nth = 2u8;
        let mut nmemb = 0usize;
        let mut saw_multiplier = false;

        loop {
            let Some(arg) = Walker::op_get_arg(self.bytecode, op, end, nth, mask)? else {
                break;
            };
            saw_multiplier = true;

            match arg.tag {
                ArgTag::Str => {}
                ArgTag::Eof => {
                    let chunk = nmemb.max(1);
                    loop {
                        let (bytes, got) = self.reader.read_elements(element_size, chunk).map_err(FspecError::Io)?;
                        if got == 0 {
                            break;
                        }
                        self.table.get_mut(id)?.buffer.extend_from_slice(&bytes);
                        nmemb += got;
                        if got < chunk {
                            break;
                        }
                    }
                }
                ArgTag::Num | ArgTag::Var => {
                    let v = match arg.tag {
                        ArgTag::Num => arg.as_num().unwrap_or(0),
                        ArgTag::Var => {
                            let vid = match arg.payload {
                                ArgPayload::Var(v) => v.0,
                                _ => unreachable!(),
                            };
                            self.resolve_var_number(vid)?
                        }
                        _ => unreachable!(),
                    };
                    if v == 0 {
                        break;
                    }
                    let to_read = (v as usize).saturating_mul(nmemb.max(1));
                    let (bytes, got) = self.reader.read_elements(element_size, to_read).map_err(FspecError::Io)?;
                    self.table.get_mut(id)?.buffer.extend_from_slice(&bytes);
                    nmemb += got;
                }
                ArgTag::Off => unreachable!("OFF excluded from READ's argument mask"),
            }

            nth += 1;
        }

        if !saw_multiplier {
            let (bytes, got) = self.reader.read_elements(element_size, 1).map_err(FspecError::Io)?;
            self.table.get_mut(id)?.buffer.extend_from_slice(&bytes);
            nmemb = got;
        }

        self.table.get_mut(id)?.nmemb = nmemb;
        Ok(())
    }

    fn exec_goto(
        &mut self,
        op: usize,
        end: usize,
        current: &mut Option<u16>,
        out: &mut dyn Write,
    ) -> FspecResult<()> {
        let target_arg = Walker::op_get_arg(self.bytecode, op, end, 1, ArgMask::VAR)?
            .ok_or(FspecError::MissingArgument { offset: op, nth: 1 })?;
        let target_id = match target_arg.payload {
            ArgPayload::Var(v) => v.0,
            _ => unreachable!(),
        };

        *current = None;

        let mult_mask = ArgMask::NUM | ArgMask::VAR | ArgMask::EOF;
        let mult_arg = Walker::op_get_arg(self.bytecode, op, end, 2, mult_mask)?;

        let target = self.table.get(target_id)?;
        let (tstart, tend) = (target.start, target.end);
        if tend <= tstart {
            return Err(FspecError::GotoTargetInvalid(target_id));
        }

        match mult_arg {
            None => self.run_body(tstart, tend, out)?,
            Some(arg) if arg.tag == ArgTag::Eof => {
                while !self.reader.is_eof() {
                    self.run_body(tstart, tend, out)?;
                }
            }
            Some(arg) => {
                let n = match arg.tag {
                    ArgTag::Num => arg.as_num().unwrap_or(0),
                    ArgTag::Var => {
                        let vid = match arg.payload {
                            ArgPayload::Var(v) => v.0,
                            _ => unreachable!(),
                        };
                        self.resolve_var_number(vid)?
                    }
                    _ => unreachable!(),
                };
                for _ in 0..n {
                    self.run_body(tstart, tend, out)?;
                }
            }
        }

        Ok(())
    }

    fn exec_filter(&mut self, op: usize, end: usize, current: Option<u16>) -> FspecResult<()> {
        let id = current.ok_or(FspecError::FilterOutsideDeclaration)?;

        let name_arg = Walker::op_get_arg(self.bytecode, op, end, 1, ArgMask::STR)?
            .ok_or(FspecError::MissingArgument { offset: op, nth: 1 })?;
        let name = match &name_arg.payload {
            ArgPayload::Str(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            _ => unreachable!(),
        };

        let mut fargs = Vec::new();
        let opt_mask = ArgMask::STR | ArgMask::NUM | ArgMask::VAR;
        let mut nth = 2u8;
        loop {
            let Some(arg) = Walker::op_get_arg(self.bytecode, op, end, nth, opt_mask)? else {
                break;
            };
            fargs.push(self.decode_filter_arg(&arg)?);
            nth += 1;
        }

        match self.filters.get(&name) {
            Some(f) => {
                let decl = self.table.get_mut(id)?;
                f(&fargs, decl)?;
            }
            None => {
                log::warn!("unknown filter '{name}', leaving declaration buffer untouched");
            }
        }

        Ok(())
    }

    fn decode_filter_arg(&self, arg: &crate::bytecode::Arg) -> FspecResult<FilterArg> {
        Ok(match &arg.payload {
            ArgPayload::Str(bytes) => FilterArg::Str(String::from_utf8_lossy(bytes).into_owned()),
            ArgPayload::Num(n) => FilterArg::Num(n.0),
            ArgPayload::Var(v) => {
                let referenced = self.table.get(v.0)?;
                if referenced.visual == Visual::Str {
                    FilterArg::Str(String::from_utf8_lossy(&referenced.buffer).into_owned())
                } else {
                    FilterArg::Num(referenced.as_number())
                }
            }
            other => {
                return Err(FspecError::UnexpectedArgTag {
                    found: match other {
                        ArgPayload::Off(_) => ArgTag::Off,
                        ArgPayload::Dat(_) => ArgTag::Dat,
                        ArgPayload::Eof => ArgTag::Eof,
                        _ => unreachable!(),
                    },
                    expected: ArgMask::STR | ArgMask::NUM | ArgMask::VAR,
                })
            }
        })
    }

    fn exec_visual(&mut self, op: usize, end: usize, current: Option<u16>) -> FspecResult<()> {
        let id = current.ok_or(FspecError::VisualOutsideDeclaration)?;
        let arg = Walker::op_get_arg(self.bytecode, op, end, 1, ArgMask::NUM)?
            .ok_or(FspecError::MissingArgument { offset: op, nth: 1 })?;
        let value = arg.as_num().unwrap_or(0);
        let visual = Visual::from_num(value)
            .ok_or_else(|| FspecError::Truncated(format!("invalid visual value {value} at {op}")))?;
        self.table.get_mut(id)?.visual = visual;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{ArgTag as Tag, Opcode as Op};

    struct Builder {
        code: Vec<u8>,
        str_patches: Vec<(usize, String)>,
    }

    impl Builder {
        fn new() -> Self {
            Builder {
                code: Vec::new(),
                str_patches: Vec::new(),
            }
        }

        fn op(&mut self, op: Op) -> &mut Self {
            self.code.push(op as u8);
            self
        }

        fn num(&mut self, v: u64) -> &mut Self {
            self.code.push(Op::Arg as u8);
            self.code.push(Tag::Num as u8);
            self.code.extend_from_slice(&v.to_le_bytes());
            self
        }

        fn var(&mut self, id: u16) -> &mut Self {
            self.code.push(Op::Arg as u8);
            self.code.push(Tag::Var as u8);
            self.code.extend_from_slice(&id.to_le_bytes());
            self
        }

        fn eof(&mut self) -> &mut Self {
            self.code.push(Op::Arg as u8);
            self.code.push(Tag::Eof as u8);
            self
        }

        fn off_placeholder(&mut self) -> usize {
            self.code.push(Op::Arg as u8);
            self.code.push(Tag::Off as u8);
            let pos = self.code.len();
            self.code.extend_from_slice(&0u32.to_le_bytes());
            pos
        }

        fn patch_off(&mut self, pos: usize, value: u32) {
            self.code[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
        }

        fn str_arg(&mut self, s: &str) -> &mut Self {
            self.code.push(Op::Arg as u8);
            self.code.push(Tag::Str as u8);
            self.str_patches.push((self.code.len(), s.to_string()));
            self.code.extend_from_slice(&0u32.to_le_bytes());
            self
        }

        /// Appends the data area holding all pending string literals and
        /// patches their `OFF` payloads to point at it. Call once, last.
        fn finish(mut self) -> Vec<u8> {
            let mut data = Vec::new();
            for (patch_pos, s) in &self.str_patches {
                let off = self.code.len() as u32 + data.len() as u32;
                self.code[*patch_pos..*patch_pos + 4].copy_from_slice(&off.to_le_bytes());
                data.push(s.len() as u8);
                data.extend_from_slice(s.as_bytes());
            }
            self.code.extend_from_slice(&data);
            self.code
        }
    }

    /// Builds a single-struct, single-member program:
    /// `struct <struct_name> { <member_name>: width(+flags) [count-args] }`
    /// and returns (bytecode, member_id).
    fn single_member_program(
        member_width_bits: u64,
        signed: bool,
        count_args: impl FnOnce(&mut Builder),
        visual: Option<Visual>,
    ) -> Vec<u8> {
        let mut b = Builder::new();
        b.op(Op::Header).num(1).num(2);

        let struct_start = b.code.len();
        b.op(Op::Declaration).num(0).num(0);
        let struct_off_pos = b.off_placeholder();
        b.str_arg("root");

        let member_start = b.code.len();
        b.op(Op::Declaration).num(1).num(1);
        let member_off_pos = b.off_placeholder();
        b.str_arg("field");

        b.op(Op::Read);
        let width_encoded = member_width_bits | if signed { 0x100 } else { 0 };
        b.num(width_encoded);
        count_args(&mut b);

        if let Some(v) = visual {
            b.op(Op::Visual).num(v as u64);
        }

        let member_end = b.code.len();
        b.patch_off(member_off_pos, (member_end - member_start) as u32);
        b.patch_off(struct_off_pos, (member_end - struct_start) as u32);

        b.finish()
    }

    fn run_program(code: &[u8], input: &[u8]) -> String {
        let table = DeclarationTable::setup(code, code.len()).unwrap();
        let filters = FilterRegistry::with_builtins();
        let mut reader = input;
        let mut interp = Interpreter::new(code, table, filters, &mut reader);
        let mut out = Vec::new();
        interp.run(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn scenario_single_u8_hex() {
        let code = single_member_program(8, false, |_| {}, Some(Visual::Hex));
        let out = run_program(&code, &[0xab]);
        assert_eq!(out, "field: 0xab\n");
    }

    #[test]
    fn scenario_read_until_eof_u16_dec() {
        let code = single_member_program(16, false, |b| { b.eof(); }, None);
        let out = run_program(&code, &[0x01, 0x00, 0x02, 0x00, 0x03, 0x00]);
        assert_eq!(out, "field: { 1, 2, 3 }\n");
    }

    #[test]
    fn scenario_visual_switch_default_is_dec() {
        let code = single_member_program(8, false, |_| {}, None);
        let out = run_program(&code, &[0x0a]);
        assert_eq!(out, "field: 10\n");
    }

    /// spec.md §8 scenario 5: two `u8 x` fields, the first with no
    /// `VISUAL` op (default `DEC`), the second with an explicit
    /// `VISUAL HEX`. Both declarations share the name `x`, which the
    /// compiled front end rejects as a duplicate (`compiler.rs`'s
    /// `alloc_id`) but the bytecode format itself permits — declarations
    /// are keyed by id, not by name — so this is hand-built via `Builder`
    /// rather than compiled from source.
    #[test]
    fn scenario_visual_switch_two_fields_default_then_hex() {
        let mut b = Builder::new();
        b.op(Op::Header).num(1).num(3);

        let struct_start = b.code.len();
        b.op(Op::Declaration).num(0).num(0);
        let struct_off_pos = b.off_placeholder();
        b.str_arg("root");

        let first_start = b.code.len();
        b.op(Op::Declaration).num(1).num(1);
        let first_off_pos = b.off_placeholder();
        b.str_arg("x");
        b.op(Op::Read).num(8);
        let first_end = b.code.len();
        b.patch_off(first_off_pos, (first_end - first_start) as u32);

        let second_start = b.code.len();
        b.op(Op::Declaration).num(1).num(2);
        let second_off_pos = b.off_placeholder();
        b.str_arg("x");
        b.op(Op::Read).num(8);
        b.op(Op::Visual).num(Visual::Hex as u64);
        let second_end = b.code.len();
        b.patch_off(second_off_pos, (second_end - second_start) as u32);

        let struct_end = b.code.len();
        b.patch_off(struct_off_pos, (struct_end - struct_start) as u32);
        let code = b.finish();

        let out = run_program(&code, &[0x0a, 0x0a]);
        assert_eq!(out, "x: 10\nx: 0x0a\n");
    }

    #[test]
    fn scenario_multiline_string_is_fenced() {
        let mut b = Builder::new();
        b.op(Op::Header).num(1).num(2);
        let struct_start = b.code.len();
        b.op(Op::Declaration).num(0).num(0);
        let struct_off_pos = b.off_placeholder();
        b.str_arg("root");

        let member_start = b.code.len();
        b.op(Op::Declaration).num(1).num(1);
        let member_off_pos = b.off_placeholder();
        b.str_arg("s");
        b.op(Op::Read).num(8);
        b.eof();
        b.op(Op::Visual).num(Visual::Str as u64);
        let member_end = b.code.len();
        b.patch_off(member_off_pos, (member_end - member_start) as u32);
        b.patch_off(struct_off_pos, (member_end - struct_start) as u32);
        let code = b.finish();

        let out = run_program(&code, b"Hi\nbye");
        assert_eq!(out, "s: ```\nHi\nbye\n```\n");
    }

    #[test]
    fn filter_after_declaration_closes_is_fatal() {
        let mut b = Builder::new();
        b.op(Op::Header).num(1).num(2);
        let struct_start = b.code.len();
        b.op(Op::Declaration).num(0).num(0);
        let struct_off_pos = b.off_placeholder();
        b.str_arg("root");

        let member_start = b.code.len();
        b.op(Op::Declaration).num(1).num(1);
        let member_off_pos = b.off_placeholder();
        b.str_arg("field");
        b.op(Op::Read).num(8);
        let member_end = b.code.len();
        b.patch_off(member_off_pos, (member_end - member_start) as u32);

        // current is cleared once the member's body closes; a FILTER here
        // has no declaration to apply to.
        b.op(Op::Filter).str_arg("encoding");

        let struct_end = b.code.len();
        b.patch_off(struct_off_pos, (struct_end - struct_start) as u32);
        let code = b.finish();

        let out = run_program_result(&code, &[0x41]);
        assert!(matches!(out, Err(FspecError::FilterOutsideDeclaration)));
    }

    #[test]
    fn goto_executes_target_body_var_count_times() {
        let mut b = Builder::new();
        b.op(Op::Header).num(1).num(3);

        let root_start = b.code.len();
        b.op(Op::Declaration).num(0).num(0);
        let root_off_pos = b.off_placeholder();
        b.str_arg("root");

        let count_start = b.code.len();
        b.op(Op::Declaration).num(1).num(1);
        let count_off_pos = b.off_placeholder();
        b.str_arg("count");
        b.op(Op::Read).num(8);
        let count_end = b.code.len();
        b.patch_off(count_off_pos, (count_end - count_start) as u32);

        b.op(Op::Goto).var(2).var(1);

        let root_end = b.code.len();
        b.patch_off(root_off_pos, (root_end - root_start) as u32);

        let item_start = b.code.len();
        b.op(Op::Declaration).num(1).num(2);
        let item_off_pos = b.off_placeholder();
        b.str_arg("item");
        b.op(Op::Read).num(8);
        let item_end = b.code.len();
        b.patch_off(item_off_pos, (item_end - item_start) as u32);

        let code = b.finish();
        let out = run_program(&code, &[0x02, 0x10, 0x20]);
        assert_eq!(out, "count: 2\nitem: 16\nitem: 32\n");
    }

    fn run_program_result(code: &[u8], input: &[u8]) -> FspecResult<String> {
        let table = DeclarationTable::setup(code, code.len())?;
        let filters = FilterRegistry::with_builtins();
        let mut reader = input;
        let mut interp = Interpreter::new(code, table, filters, &mut reader);
        let mut out = Vec::new();
        interp.run(&mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }
}
