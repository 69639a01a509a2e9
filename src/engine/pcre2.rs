//! The native PCRE2 binding.
//!
//! A thin, stateless translation of [`Engine`] calls onto the 8-bit PCRE2
//! C API. Handles are the raw pointers the library hands out; ownership of
//! every handle stays with the caller, which frees it through the matching
//! `*_free` operation.

use super::options::{CONFIG_VERSION, ERROR_BADSERIALIZEDDATA, ERROR_NOSUBSTRING, INFO_NAMETABLE};
use super::options::{INFO_NAMECOUNT, INFO_NAMEENTRYSIZE};
use super::{
    CodeHandle, CompileContextHandle, ConvertContextHandle, Engine, JitStackHandle,
    MatchContextHandle, MatchDataHandle, NativeFailure,
};
use libc::{c_int, c_void};
use pcre2_sys::*;
use std::ffi::CString;
use std::ptr;
use std::slice;

/// Size of the serialized-data header: magic, version, config, code count.
const SERIALIZED_HEADER_SIZE: usize = 16;

/// Capacity of the buffer error messages are formatted into.
const ERROR_MESSAGE_CAPACITY: usize = 256;

/// The native PCRE2 library.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pcre2 {
    _private: (),
}

impl Pcre2 {
    pub fn new() -> Self {
        Self::default()
    }
}

fn code_ptr(code: CodeHandle) -> *mut pcre2_code_8 {
    code.as_raw() as *mut pcre2_code_8
}

fn data_ptr(data: MatchDataHandle) -> *mut pcre2_match_data_8 {
    data.as_raw() as *mut pcre2_match_data_8
}

fn mctx_ptr(ctx: MatchContextHandle) -> *mut pcre2_match_context_8 {
    ctx.as_raw() as *mut pcre2_match_context_8
}

fn opt_mctx_ptr(ctx: Option<MatchContextHandle>) -> *mut pcre2_match_context_8 {
    ctx.map_or(ptr::null_mut(), mctx_ptr)
}

fn cctx_ptr(ctx: CompileContextHandle) -> *mut pcre2_compile_context_8 {
    ctx.as_raw() as *mut pcre2_compile_context_8
}

fn cvctx_ptr(ctx: ConvertContextHandle) -> *mut pcre2_convert_context_8 {
    ctx.as_raw() as *mut pcre2_convert_context_8
}

fn stack_ptr(stack: JitStackHandle) -> *mut pcre2_jit_stack_8 {
    stack.as_raw() as *mut pcre2_jit_stack_8
}

fn c_name(name: &str) -> Option<CString> {
    CString::new(name).ok()
}

impl Engine for Pcre2 {
    fn name(&self) -> &str {
        "pcre2"
    }

    fn config(&self, what: u32) -> Result<u32, i32> {
        let mut value: u32 = 0;
        let rc = unsafe { pcre2_config_8(what, &mut value as *mut u32 as *mut c_void) };
        if rc < 0 {
            Err(rc)
        } else {
            Ok(value)
        }
    }

    fn version(&self) -> String {
        let needed = unsafe { pcre2_config_8(CONFIG_VERSION, ptr::null_mut()) };
        if needed <= 0 {
            return String::new();
        }
        let mut buffer = vec![0u8; needed as usize];
        let rc = unsafe { pcre2_config_8(CONFIG_VERSION, buffer.as_mut_ptr() as *mut c_void) };
        if rc < 0 {
            return String::new();
        }
        String::from_utf8_lossy(&buffer)
            .trim_end_matches('\0')
            .to_string()
    }

    fn error_message(&self, code: i32) -> String {
        let mut buffer = [0u8; ERROR_MESSAGE_CAPACITY];
        let rc = unsafe { pcre2_get_error_message_8(code, buffer.as_mut_ptr(), buffer.len()) };
        if rc < 0 {
            return format!("unknown error code {code}");
        }
        String::from_utf8_lossy(&buffer[..rc as usize]).into_owned()
    }

    fn compile_context_create(&self) -> Option<CompileContextHandle> {
        let ctx = unsafe { pcre2_compile_context_create_8(ptr::null_mut()) };
        CompileContextHandle::from_raw(ctx as usize)
    }

    fn compile_context_copy(&self, ctx: CompileContextHandle) -> Option<CompileContextHandle> {
        let copy = unsafe { pcre2_compile_context_copy_8(cctx_ptr(ctx)) };
        CompileContextHandle::from_raw(copy as usize)
    }

    fn compile_context_free(&self, ctx: CompileContextHandle) {
        unsafe { pcre2_compile_context_free_8(cctx_ptr(ctx)) }
    }

    fn set_newline(&self, ctx: CompileContextHandle, newline: u32) -> i32 {
        unsafe { pcre2_set_newline_8(cctx_ptr(ctx), newline) }
    }

    fn set_parens_nest_limit(&self, ctx: CompileContextHandle, limit: u32) -> i32 {
        unsafe { pcre2_set_parens_nest_limit_8(cctx_ptr(ctx), limit) }
    }

    fn set_max_pattern_length(&self, ctx: CompileContextHandle, length: usize) -> i32 {
        unsafe { pcre2_set_max_pattern_length_8(cctx_ptr(ctx), length) }
    }

    fn match_context_create(&self) -> Option<MatchContextHandle> {
        let ctx = unsafe { pcre2_match_context_create_8(ptr::null_mut()) };
        MatchContextHandle::from_raw(ctx as usize)
    }

    fn match_context_copy(&self, ctx: MatchContextHandle) -> Option<MatchContextHandle> {
        let copy = unsafe { pcre2_match_context_copy_8(mctx_ptr(ctx)) };
        MatchContextHandle::from_raw(copy as usize)
    }

    fn match_context_free(&self, ctx: MatchContextHandle) {
        unsafe { pcre2_match_context_free_8(mctx_ptr(ctx)) }
    }

    fn set_match_limit(&self, ctx: MatchContextHandle, limit: u32) -> i32 {
        unsafe { pcre2_set_match_limit_8(mctx_ptr(ctx), limit) }
    }

    fn set_depth_limit(&self, ctx: MatchContextHandle, limit: u32) -> i32 {
        unsafe { pcre2_set_depth_limit_8(mctx_ptr(ctx), limit) }
    }

    fn set_heap_limit(&self, ctx: MatchContextHandle, kib: u32) -> i32 {
        unsafe { pcre2_set_heap_limit_8(mctx_ptr(ctx), kib) }
    }

    fn set_offset_limit(&self, ctx: MatchContextHandle, limit: usize) -> i32 {
        unsafe { pcre2_set_offset_limit_8(mctx_ptr(ctx), limit) }
    }

    fn compile(
        &self,
        pattern: &[u8],
        options: u32,
        ctx: Option<CompileContextHandle>,
    ) -> Result<CodeHandle, NativeFailure> {
        let mut error_code: c_int = 0;
        let mut error_offset: usize = 0;
        let code = unsafe {
            pcre2_compile_8(
                pattern.as_ptr(),
                pattern.len(),
                options,
                &mut error_code,
                &mut error_offset,
                ctx.map_or(ptr::null_mut(), cctx_ptr),
            )
        };
        CodeHandle::from_raw(code as usize).ok_or(NativeFailure {
            code: error_code,
            offset: error_offset,
        })
    }

    fn code_copy(&self, code: CodeHandle) -> Option<CodeHandle> {
        let copy = unsafe { pcre2_code_copy_8(code_ptr(code)) };
        CodeHandle::from_raw(copy as usize)
    }

    fn code_free(&self, code: CodeHandle) {
        unsafe { pcre2_code_free_8(code_ptr(code)) }
    }

    fn pattern_info_u32(&self, code: CodeHandle, what: u32) -> Result<u32, i32> {
        let mut value: u32 = 0;
        let rc = unsafe {
            pcre2_pattern_info_8(code_ptr(code), what, &mut value as *mut u32 as *mut c_void)
        };
        if rc < 0 {
            Err(rc)
        } else {
            Ok(value)
        }
    }

    fn pattern_info_size(&self, code: CodeHandle, what: u32) -> Result<usize, i32> {
        let mut value: usize = 0;
        let rc = unsafe {
            pcre2_pattern_info_8(code_ptr(code), what, &mut value as *mut usize as *mut c_void)
        };
        if rc < 0 {
            Err(rc)
        } else {
            Ok(value)
        }
    }

    fn name_table(&self, code: CodeHandle) -> Result<Vec<(u32, String)>, i32> {
        let count = self.pattern_info_u32(code, INFO_NAMECOUNT)? as usize;
        if count == 0 {
            return Ok(Vec::new());
        }
        let entry_size = self.pattern_info_u32(code, INFO_NAMEENTRYSIZE)? as usize;

        let mut table: *const u8 = ptr::null();
        let rc = unsafe {
            pcre2_pattern_info_8(
                code_ptr(code),
                INFO_NAMETABLE,
                &mut table as *mut *const u8 as *mut c_void,
            )
        };
        if rc < 0 {
            return Err(rc);
        }
        if table.is_null() || entry_size < 3 {
            return Ok(Vec::new());
        }

        // Each entry: group number (2 bytes, big-endian), then the
        // zero-terminated name, padded to the entry size.
        let bytes = unsafe { slice::from_raw_parts(table, count * entry_size) };
        let entries = bytes
            .chunks_exact(entry_size)
            .map(|entry| {
                let number = u32::from(u16::from_be_bytes([entry[0], entry[1]]));
                let name = &entry[2..];
                let len = name.iter().position(|&b| b == 0).unwrap_or(name.len());
                (number, String::from_utf8_lossy(&name[..len]).into_owned())
            })
            .collect();
        Ok(entries)
    }

    fn jit_compile(&self, code: CodeHandle, options: u32) -> i32 {
        unsafe { pcre2_jit_compile_8(code_ptr(code), options) }
    }

    fn jit_match(
        &self,
        code: CodeHandle,
        subject: &[u8],
        start: usize,
        options: u32,
        data: MatchDataHandle,
        ctx: Option<MatchContextHandle>,
    ) -> i32 {
        unsafe {
            pcre2_jit_match_8(
                code_ptr(code),
                subject.as_ptr(),
                subject.len(),
                start,
                options,
                data_ptr(data),
                opt_mctx_ptr(ctx),
            )
        }
    }

    fn jit_stack_create(&self, start_size: usize, max_size: usize) -> Option<JitStackHandle> {
        let stack = unsafe { pcre2_jit_stack_create_8(start_size, max_size, ptr::null_mut()) };
        JitStackHandle::from_raw(stack as usize)
    }

    fn jit_stack_assign(&self, ctx: MatchContextHandle, stack: Option<JitStackHandle>) {
        let data = stack.map_or(ptr::null_mut(), |s| stack_ptr(s) as *mut c_void);
        unsafe { pcre2_jit_stack_assign_8(mctx_ptr(ctx), None, data) }
    }

    fn jit_stack_free(&self, stack: JitStackHandle) {
        unsafe { pcre2_jit_stack_free_8(stack_ptr(stack)) }
    }

    fn match_data_create(&self, pairs: u32) -> Option<MatchDataHandle> {
        let data = unsafe { pcre2_match_data_create_8(pairs, ptr::null_mut()) };
        MatchDataHandle::from_raw(data as usize)
    }

    fn match_data_create_from_pattern(&self, code: CodeHandle) -> Option<MatchDataHandle> {
        let data =
            unsafe { pcre2_match_data_create_from_pattern_8(code_ptr(code), ptr::null_mut()) };
        MatchDataHandle::from_raw(data as usize)
    }

    fn match_data_free(&self, data: MatchDataHandle) {
        unsafe { pcre2_match_data_free_8(data_ptr(data)) }
    }

    fn ovector_count(&self, data: MatchDataHandle) -> u32 {
        unsafe { pcre2_get_ovector_count_8(data_ptr(data)) }
    }

    fn read_ovector(&self, data: MatchDataHandle, out: &mut [usize]) {
        let slots = self.ovector_count(data) as usize * 2;
        let ovector = unsafe { pcre2_get_ovector_pointer_8(data_ptr(data)) };
        if ovector.is_null() {
            return;
        }
        let available = unsafe { slice::from_raw_parts(ovector, slots) };
        let n = out.len().min(slots);
        out[..n].copy_from_slice(&available[..n]);
    }

    fn match_subject(
        &self,
        code: CodeHandle,
        subject: &[u8],
        start: usize,
        options: u32,
        data: MatchDataHandle,
        ctx: Option<MatchContextHandle>,
    ) -> i32 {
        unsafe {
            pcre2_match_8(
                code_ptr(code),
                subject.as_ptr(),
                subject.len(),
                start,
                options,
                data_ptr(data),
                opt_mctx_ptr(ctx),
            )
        }
    }

    fn dfa_match(
        &self,
        code: CodeHandle,
        subject: &[u8],
        start: usize,
        options: u32,
        data: MatchDataHandle,
        ctx: Option<MatchContextHandle>,
        workspace: &mut [i32],
    ) -> i32 {
        unsafe {
            pcre2_dfa_match_8(
                code_ptr(code),
                subject.as_ptr(),
                subject.len(),
                start,
                options,
                data_ptr(data),
                opt_mctx_ptr(ctx),
                workspace.as_mut_ptr(),
                workspace.len(),
            )
        }
    }

    fn substring_number_from_name(&self, code: CodeHandle, name: &str) -> i32 {
        match c_name(name) {
            Some(name) => unsafe {
                pcre2_substring_number_from_name_8(code_ptr(code), name.as_ptr() as *const u8)
            },
            None => ERROR_NOSUBSTRING,
        }
    }

    fn substring_length_by_number(&self, data: MatchDataHandle, number: u32) -> Result<usize, i32> {
        let mut length: usize = 0;
        let rc = unsafe { pcre2_substring_length_bynumber_8(data_ptr(data), number, &mut length) };
        if rc < 0 {
            Err(rc)
        } else {
            Ok(length)
        }
    }

    fn substring_copy_by_number(
        &self,
        data: MatchDataHandle,
        number: u32,
        buffer: &mut [u8],
    ) -> Result<usize, i32> {
        let mut length = buffer.len();
        let rc = unsafe {
            pcre2_substring_copy_bynumber_8(data_ptr(data), number, buffer.as_mut_ptr(), &mut length)
        };
        if rc < 0 {
            Err(rc)
        } else {
            Ok(length)
        }
    }

    fn substring_length_by_name(&self, data: MatchDataHandle, name: &str) -> Result<usize, i32> {
        let name = c_name(name).ok_or(ERROR_NOSUBSTRING)?;
        let mut length: usize = 0;
        let rc = unsafe {
            pcre2_substring_length_byname_8(data_ptr(data), name.as_ptr() as *const u8, &mut length)
        };
        if rc < 0 {
            Err(rc)
        } else {
            Ok(length)
        }
    }

    fn substring_copy_by_name(
        &self,
        data: MatchDataHandle,
        name: &str,
        buffer: &mut [u8],
    ) -> Result<usize, i32> {
        let name = c_name(name).ok_or(ERROR_NOSUBSTRING)?;
        let mut length = buffer.len();
        let rc = unsafe {
            pcre2_substring_copy_byname_8(
                data_ptr(data),
                name.as_ptr() as *const u8,
                buffer.as_mut_ptr(),
                &mut length,
            )
        };
        if rc < 0 {
            Err(rc)
        } else {
            Ok(length)
        }
    }

    fn substitute(
        &self,
        code: CodeHandle,
        subject: &[u8],
        start: usize,
        options: u32,
        data: Option<MatchDataHandle>,
        ctx: Option<MatchContextHandle>,
        replacement: &[u8],
        output: &mut [u8],
    ) -> (i32, usize) {
        let mut length = output.len();
        let rc = unsafe {
            pcre2_substitute_8(
                code_ptr(code),
                subject.as_ptr(),
                subject.len(),
                start,
                options,
                data.map_or(ptr::null_mut(), data_ptr),
                opt_mctx_ptr(ctx),
                replacement.as_ptr(),
                replacement.len(),
                output.as_mut_ptr(),
                &mut length,
            )
        };
        (rc, length)
    }

    fn serialize_encode(&self, codes: &[CodeHandle]) -> Result<Vec<u8>, i32> {
        let mut pointers: Vec<*const pcre2_code_8> = codes
            .iter()
            .map(|&code| code_ptr(code) as *const pcre2_code_8)
            .collect();
        let mut bytes: *mut u8 = ptr::null_mut();
        let mut size: usize = 0;
        let rc = unsafe {
            pcre2_serialize_encode_8(
                pointers.as_mut_ptr(),
                pointers.len() as i32,
                &mut bytes,
                &mut size,
                ptr::null_mut(),
            )
        };
        if rc < 0 {
            return Err(rc);
        }
        let encoded = unsafe { slice::from_raw_parts(bytes, size) }.to_vec();
        unsafe { pcre2_serialize_free_8(bytes) };
        Ok(encoded)
    }

    fn serialize_decode(&self, bytes: &[u8]) -> Result<Vec<CodeHandle>, i32> {
        let count = self.serialize_code_count(bytes);
        if count < 0 {
            return Err(count);
        }
        let mut pointers: Vec<*mut pcre2_code_8> = vec![ptr::null_mut(); count as usize];
        let rc = unsafe {
            pcre2_serialize_decode_8(pointers.as_mut_ptr(), count, bytes.as_ptr(), ptr::null_mut())
        };
        if rc < 0 {
            return Err(rc);
        }
        Ok(pointers
            .into_iter()
            .filter_map(|code| CodeHandle::from_raw(code as usize))
            .collect())
    }

    fn serialize_code_count(&self, bytes: &[u8]) -> i32 {
        if bytes.len() < SERIALIZED_HEADER_SIZE {
            return ERROR_BADSERIALIZEDDATA;
        }
        unsafe { pcre2_serialize_get_number_of_codes_8(bytes.as_ptr()) }
    }

    fn convert_context_create(&self) -> Option<ConvertContextHandle> {
        let ctx = unsafe { pcre2_convert_context_create_8(ptr::null_mut()) };
        ConvertContextHandle::from_raw(ctx as usize)
    }

    fn convert_context_free(&self, ctx: ConvertContextHandle) {
        unsafe { pcre2_convert_context_free_8(cvctx_ptr(ctx)) }
    }

    fn set_glob_separator(&self, ctx: ConvertContextHandle, separator: u32) -> i32 {
        unsafe { pcre2_set_glob_separator_8(cvctx_ptr(ctx), separator) }
    }

    fn set_glob_escape(&self, ctx: ConvertContextHandle, escape: u32) -> i32 {
        unsafe { pcre2_set_glob_escape_8(cvctx_ptr(ctx), escape) }
    }

    fn pattern_convert(
        &self,
        pattern: &[u8],
        options: u32,
        ctx: Option<ConvertContextHandle>,
    ) -> Result<Vec<u8>, NativeFailure> {
        let mut buffer: *mut u8 = ptr::null_mut();
        let mut length: usize = 0;
        let rc = unsafe {
            pcre2_pattern_convert_8(
                pattern.as_ptr(),
                pattern.len(),
                options,
                &mut buffer,
                &mut length,
                ctx.map_or(ptr::null_mut(), cvctx_ptr),
            )
        };
        if rc != 0 {
            // On failure the length holds the offset of the error.
            return Err(NativeFailure {
                code: rc,
                offset: length,
            });
        }
        let converted = unsafe { slice::from_raw_parts(buffer, length) }.to_vec();
        unsafe { pcre2_converted_pattern_free_8(buffer) };
        Ok(converted)
    }
}
