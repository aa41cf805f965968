//! Fuzz target for the full rule chain over parsed documents.

#![no_main]

use bbchkit::config::{LabelValue, MissingAttributePolicy};
use bbchkit::ir::io_voc_xml::from_voc_xml_slice;
use bbchkit::pipeline::Pipeline;
use bbchkit::rules::{ClusterTable, Rule};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }
    let Ok(document) = from_voc_xml_slice(data) else {
        return;
    };

    let clusters = vec![
        vec![LabelValue::from(71), LabelValue::from(73)],
        vec![LabelValue::from(75), LabelValue::from(77), LabelValue::from(79)],
    ];
    let pipeline = Pipeline::new(vec![
        Rule::ExtractLabelFromAttribute {
            attribute: "BBCH".to_string(),
            on_missing: MissingAttributePolicy::DropObject,
        },
        Rule::RemoveByRotation,
        Rule::ClusterLabels(ClusterTable::from_clusters(&clusters)),
    ])
    .expect("extraction leads the chain");

    let before = document.objects.len();
    if let Ok(processed) = pipeline.process(document) {
        assert!(processed.objects.len() <= before);
    }
});
