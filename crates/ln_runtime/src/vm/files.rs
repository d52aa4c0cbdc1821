//! File handles.
//!
//! A handle is closed at the first of: an explicit [`Vm::close_file`], the
//! sweep that frees its file object, or [`Vm::shutdown`].

use std::fs::OpenOptions;
use std::io::{Read, Write};

use super::Vm;
use crate::core::{FileObj, Obj, Value};
use crate::errors::VmError;

impl Vm {
    /// Opens `path` with C-style mode semantics (`r`, `w`, `a`, `r+`, `w+`,
    /// `a+`) and returns a file object.
    pub fn open_file(&mut self, path: &str, mode: &str) -> Result<Value, VmError> {
        let mut options = OpenOptions::new();
        match mode {
            "r" => options.read(true),
            "w" => options.write(true).create(true).truncate(true),
            "a" => options.append(true).create(true),
            "r+" => options.read(true).write(true),
            "w+" => options.read(true).write(true).create(true).truncate(true),
            "a+" => options.read(true).append(true).create(true),
            _ => return Err(VmError::Io(format!("Invalid file mode '{mode}'."))),
        };
        let handle = options
            .open(path)
            .map_err(|e| VmError::Io(format!("Unable to open file '{path}': {e}")))?;
        tracing::debug!(path, mode, "opened file");
        let id = self.alloc(Obj::File(FileObj {
            handle: Some(handle),
            path: path.into(),
            mode: mode.into(),
        }));
        Ok(Value::object(id))
    }

    fn file_mut(&mut self, file: Value) -> Option<&mut FileObj> {
        match self.heap.try_get_mut(file.as_obj_opt()?)? {
            Obj::File(f) => Some(f),
            _ => None,
        }
    }

    /// Closes the handle now. Returns `false` if it was already closed or
    /// `file` is not a file.
    pub fn close_file(&mut self, file: Value) -> bool {
        match self.file_mut(file) {
            Some(f) => {
                let was_open = f.handle.take().is_some();
                if was_open {
                    tracing::debug!(path = %f.path, "closed file");
                }
                was_open
            }
            None => false,
        }
    }

    pub fn file_is_open(&self, file: Value) -> bool {
        matches!(
            file.as_obj_opt().and_then(|id| self.heap.try_get(id)),
            Some(Obj::File(f)) if f.handle.is_some()
        )
    }

    pub(crate) fn read_file(&mut self, file: Value) -> Result<String, VmError> {
        let f = self
            .file_mut(file)
            .ok_or_else(|| VmError::Io("Not a file.".into()))?;
        let path = f.path.clone();
        let handle = f
            .handle
            .as_mut()
            .ok_or_else(|| VmError::Io(format!("File '{path}' is closed.")))?;
        let mut contents = String::new();
        handle.read_to_string(&mut contents)?;
        Ok(contents)
    }

    pub(crate) fn write_file(&mut self, file: Value, text: &str) -> Result<(), VmError> {
        let f = self
            .file_mut(file)
            .ok_or_else(|| VmError::Io("Not a file.".into()))?;
        let path = f.path.clone();
        let handle = f
            .handle
            .as_mut()
            .ok_or_else(|| VmError::Io(format!("File '{path}' is closed.")))?;
        handle.write_all(text.as_bytes())?;
        Ok(())
    }
}
