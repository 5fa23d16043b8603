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

use std::borrow::Cow;
use std::sync::PoisonError;

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }
    errors {
        Poisoned {
            description("a thread holding the locked panicked and poisoned the lock")
        }

        IllegalState(desc: String) {
            description(desc)
            display("Illegal state: {}", desc)
        }

        IllegalArgument(desc: String) {
            description(desc)
            display("Illegal argument: {}", desc)
        }

        UnexpectedEOF(errmsg: String) {
            description(errmsg)
            display("Unexpected EOF: {}", errmsg)
        }

        CorruptIndex(errmsg: String) {
            description(errmsg)
            display("Corrupt Index: {}", errmsg)
        }

        IndexFormatTooOld(resource: String, version: i32, min: i32, max: i32) {
            description("index format too old")
            display(
                "Format version is not supported (resource {}): {} (needs to be between {} and {}). \
                 This version of flexdex only supports indexes created with a newer release.",
                resource, version, min, max
            )
        }

        IndexFormatTooNew(resource: String, version: i32, min: i32, max: i32) {
            description("index format too new")
            display(
                "Format version is not supported (resource {}): {} (needs to be between {} and {}). \
                 The index was written by a newer release.",
                resource, version, min, max
            )
        }

        UnsupportedOperation(errmsg: Cow<'static, str>) {
            description(errmsg),
            display("Unsupported Operation: {}", errmsg)
        }

        AlreadyClosed(errmsg: String) {
            description(errmsg)
            display("Already closed: {}", errmsg)
        }

        MergeAborted(errmsg: String) {
            description(errmsg)
            display("Merge aborted: {}", errmsg)
        }

        RuntimeError(errmsg: String) {
            description(errmsg)
            display("Runtime Error: {}", errmsg)
        }
    }

    foreign_links {
        IoError(::std::io::Error);
        FromUtf8Err(::std::string::FromUtf8Error);
        Utf8Error(::std::str::Utf8Error);
        SerdeJsonError(::serde_json::Error);
    }
}

impl<Guard> From<PoisonError<Guard>> for Error {
    fn from(_: PoisonError<Guard>) -> Error {
        ErrorKind::Poisoned.into()
    }
}

impl Error {
    /// Whether this error is the expected outcome of an aborted merge rather
    /// than a genuine failure.
    pub fn is_merge_aborted(&self) -> bool {
        match self.kind() {
            ErrorKind::MergeAborted(_) => true,
            _ => false,
        }
    }

    /// Whether this error reports an on-disk format outside the supported
    /// version range.
    pub fn is_format_error(&self) -> bool {
        match self.kind() {
            ErrorKind::IndexFormatTooOld(..)
            | ErrorKind::IndexFormatTooNew(..)
            | ErrorKind::CorruptIndex(_) => true,
            _ => false,
        }
    }
}
