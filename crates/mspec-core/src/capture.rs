//! Per-specification output capture.
//!
//! Fixture bodies write diagnostic output through [`write_line`]. While a
//! specification chain runs, the engine buffers that output on the current
//! thread and hands it to listeners as `SpecificationInfo::captured_output`.
//! Outside a chain, output goes straight to stdout.

use std::cell::RefCell;

thread_local! {
    static BUFFER: RefCell<Option<String>> = const { RefCell::new(None) };
}

pub fn write(text: &str) {
    let captured = BUFFER.with(|buffer| match buffer.borrow_mut().as_mut() {
        Some(out) => {
            out.push_str(text);
            true
        }
        None => false,
    });
    if !captured {
        print!("{text}");
    }
}

pub fn write_line(text: &str) {
    write(text);
    write("\n");
}

pub fn is_capturing() -> bool {
    BUFFER.with(|buffer| buffer.borrow().is_some())
}

/// Start buffering on this thread, discarding anything left over.
pub(crate) fn begin() {
    BUFFER.with(|buffer| *buffer.borrow_mut() = Some(String::new()));
}

/// Stop buffering and return what was written, if anything.
pub(crate) fn finish() -> Option<String> {
    BUFFER
        .with(|buffer| buffer.borrow_mut().take())
        .filter(|out| !out.is_empty())
}
