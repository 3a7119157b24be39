//! libxml2 FFI for XSD validation of in-memory documents.
//!
//! Schema parsing is not thread-safe in libxml2 and happens once, when the
//! gate is built. Validation is thread-safe as long as every call uses its own
//! validation context, which is what [`LibXml2Wrapper::validate_memory`] does.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Once};

use libc::{c_char, c_int, c_void};

use crate::error::{LibXml2Error, LibXml2Result};

static LIBXML2_INIT: Once = Once::new();

#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

/// Do not fetch external entities or DTDs over the network
const XML_PARSE_NONET: c_int = 1 << 11;

#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();

    pub fn xmlSchemaNewParserCtxt(url: *const c_char) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaParse(ctxt: *const XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    pub fn xmlSchemaNewValidCtxt(schema: *const XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;

    pub fn xmlReadMemory(
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);
}

/// One error reported by libxml2 during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub line: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaValidation {
    Valid,
    Invalid(Vec<SchemaError>),
}

impl SchemaValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, SchemaValidation::Valid)
    }
}

unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *mut xmlError) {
    if user_data.is_null() || error.is_null() {
        return;
    }
    let errors = unsafe { &mut *(user_data as *mut Vec<SchemaError>) };
    let error = unsafe { &*error };
    if error.message.is_null() {
        return;
    }
    let message = unsafe { CStr::from_ptr(error.message) }
        .to_string_lossy()
        .trim()
        .to_string();
    errors.push(SchemaError {
        line: u32::try_from(error.line).ok().filter(|line| *line > 0),
        message,
    });
}

/// Shared handle to a parsed schema; freed when the last clone is dropped
#[derive(Debug, Clone)]
pub struct XmlSchemaPtr {
    inner: Arc<XmlSchemaInner>,
}

#[derive(Debug)]
struct XmlSchemaInner {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: parsed xmlSchema structures are read-only during validation
unsafe impl Send for XmlSchemaInner {}
unsafe impl Sync for XmlSchemaInner {}

impl XmlSchemaPtr {
    fn as_ptr(&self) -> *const XmlSchema {
        self.inner.ptr
    }
}

impl Drop for XmlSchemaInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlSchemaFree(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
        });
        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Parse the XSD at `path`; includes and imports are resolved relative to it
    pub fn parse_schema_file(&self, path: &Path) -> LibXml2Result<XmlSchemaPtr> {
        let path_str = path.to_str().ok_or_else(|| LibXml2Error::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let c_path = CString::new(path_str).map_err(|_| LibXml2Error::InvalidPath {
            path: path.to_path_buf(),
        })?;

        unsafe {
            let parser_ctxt = xmlSchemaNewParserCtxt(c_path.as_ptr());
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }
            let schema = xmlSchemaParse(parser_ctxt);
            xmlSchemaFreeParserCtxt(parser_ctxt);

            if schema.is_null() {
                return Err(LibXml2Error::SchemaParseFailed);
            }
            Ok(XmlSchemaPtr {
                inner: Arc::new(XmlSchemaInner {
                    ptr: schema,
                    _phantom: PhantomData,
                }),
            })
        }
    }

    /// Validate a document held in memory
    pub fn validate_memory(
        &self,
        schema: &XmlSchemaPtr,
        filename: &str,
        content: &[u8],
    ) -> LibXml2Result<SchemaValidation> {
        let size = c_int::try_from(content.len()).map_err(|_| LibXml2Error::InternalError {
            details: format!("{} is too large for libxml2", filename),
        })?;
        let c_name = CString::new(filename).map_err(|_| LibXml2Error::InternalError {
            details: format!("invalid file name {}", filename),
        })?;

        unsafe {
            let doc = xmlReadMemory(
                content.as_ptr() as *const c_char,
                size,
                c_name.as_ptr(),
                std::ptr::null(),
                XML_PARSE_NONET,
            );
            if doc.is_null() {
                return Ok(SchemaValidation::Invalid(vec![SchemaError {
                    line: None,
                    message: "document could not be parsed by libxml2".to_string(),
                }]));
            }

            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                xmlFreeDoc(doc);
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            let mut errors: Vec<SchemaError> = Vec::new();
            xmlSchemaSetValidStructuredErrors(
                valid_ctxt,
                Some(structured_error_callback),
                &mut errors as *mut Vec<SchemaError> as *mut c_void,
            );

            let code = xmlSchemaValidateDoc(valid_ctxt, doc);
            xmlSchemaFreeValidCtxt(valid_ctxt);
            xmlFreeDoc(doc);

            match code {
                0 => Ok(SchemaValidation::Valid),
                n if n > 0 => Ok(SchemaValidation::Invalid(errors)),
                n => Err(LibXml2Error::ValidationFailed {
                    code: n,
                    file: filename.into(),
                }),
            }
        }
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}
