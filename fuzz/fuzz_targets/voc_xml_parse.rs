//! Fuzz target for VOC XML parsing.
//!
//! Arbitrary bytes go to the parser; any document it accepts must survive
//! a write and reparse.

#![no_main]

use bbchkit::ir::io_voc_xml::{from_voc_xml_slice, from_voc_xml_str, to_voc_xml_string};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Cap input size to avoid excessive memory usage.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(document) = from_voc_xml_slice(data) {
        let reparsed = from_voc_xml_str(&to_voc_xml_string(&document));
        assert!(reparsed.is_ok(), "written document failed to reparse");
    }
});
