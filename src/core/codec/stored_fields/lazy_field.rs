// Copyright 2019 Zhizhesihai (Beijing) Technology Limited.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use core::store::io::{DataInput, IndexInput};
use core::util::VariantValue;

use error::ErrorKind::AlreadyClosed;
use error::Result;

/// The `.fdt` input of an open reader, shared with the lazy fields it
/// handed out. Every read works on its own clone of the input.
pub struct FieldsStream {
    name: String,
    input: Box<dyn IndexInput>,
    closed: AtomicBool,
}

impl FieldsStream {
    pub(crate) fn new(input: Box<dyn IndexInput>) -> FieldsStream {
        FieldsStream {
            name: input.name().to_string(),
            input,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns a clone of the input with its own file position.
    pub fn clone_input(&self) -> Result<Box<dyn IndexInput>> {
        if self.is_closed() {
            bail!(AlreadyClosed(format!("stored fields {} are closed", self.name)));
        }
        self.input.as_ref().clone()
    }

    pub fn len(&self) -> u64 {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A string or binary stored field whose bytes are read on first access.
pub struct LazyField {
    stream: Arc<FieldsStream>,
    pointer: i64,
    length: usize,
    binary: bool,
    /// keep the value once read, false for `Latent` fields
    cache: bool,
    value: Mutex<Option<VariantValue>>,
}

impl LazyField {
    pub(crate) fn new(
        stream: Arc<FieldsStream>,
        pointer: i64,
        length: usize,
        binary: bool,
        cache: bool,
    ) -> LazyField {
        LazyField {
            stream,
            pointer,
            length,
            binary,
            cache,
            value: Mutex::new(None),
        }
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Byte length of the value in the stored fields file.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the value, reading it if needed. A cached value stays
    /// available after the reader is closed.
    pub fn value(&self) -> Result<VariantValue> {
        if self.cache {
            let mut cached = self.value.lock()?;
            if let Some(ref v) = *cached {
                return Ok(v.clone());
            }
            let v = self.read()?;
            *cached = Some(v.clone());
            return Ok(v);
        }
        self.read()
    }

    fn read(&self) -> Result<VariantValue> {
        let mut input = self.stream.clone_input()?;
        input.seek(self.pointer)?;
        let mut bytes = vec![0u8; self.length];
        input.read_bytes(&mut bytes, 0, self.length)?;
        if self.binary {
            Ok(VariantValue::Binary(bytes))
        } else {
            Ok(VariantValue::VString(String::from_utf8(bytes)?))
        }
    }
}

impl fmt::Debug for LazyField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LazyField")
            .field("pointer", &self.pointer)
            .field("length", &self.length)
            .field("binary", &self.binary)
            .field("cache", &self.cache)
            .finish()
    }
}
