#![allow(dead_code)]

use bbchkit::config::LabelValue;
use bbchkit::ir::{AnnotationDocument, BoundingBox, ObjectAnnotation};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub const EPS_VOC: f64 = 1e-9;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// BBCH-like codes, sometimes with stray whitespace or a leading zero.
pub fn arb_label() -> BoxedStrategy<String> {
    prop_oneof![
        4 => (0u32..100).prop_map(|code| code.to_string()),
        1 => (0u32..100).prop_map(|code| format!(" {code} ")),
        1 => (0u32..10).prop_map(|code| format!("0{code}")),
        1 => proptest::string::string_regex("[a-z]{1,6}").expect("valid label regex"),
    ]
    .boxed()
}

/// Rotation attribute values: absent, zero in several spellings, or nonzero.
pub fn arb_rotation() -> BoxedStrategy<Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("0".to_string())),
        Just(Some("0.0".to_string())),
        Just(Some("-0".to_string())),
        (1u32..3600).prop_map(|tenths| Some(format!("{}", tenths as f64 / 10.0))),
        (1u32..3600).prop_map(|tenths| Some(format!("-{}", tenths as f64 / 10.0))),
    ]
    .boxed()
}

pub fn arb_bbox_within(width: u32, height: u32) -> BoxedStrategy<BoundingBox> {
    (0..width, 0..height)
        .prop_flat_map(move |(x0, y0)| {
            ((x0 + 1)..=width, (y0 + 1)..=height).prop_map(move |(x1, y1)| {
                BoundingBox::from_xyxy(x0 as f64, y0 as f64, x1 as f64, y1 as f64)
            })
        })
        .boxed()
}

pub fn arb_object() -> BoxedStrategy<ObjectAnnotation> {
    (arb_label(), arb_bbox_within(640, 480), arb_label(), arb_rotation())
        .prop_map(|(label, bbox, bbch, rotation)| {
            let mut object = ObjectAnnotation::new(label, bbox).with_attribute("BBCH", bbch);
            if let Some(rotation) = rotation {
                object = object.with_attribute("rotation", rotation);
            }
            object
        })
        .boxed()
}

pub fn arb_document(max_objects: usize) -> BoxedStrategy<AnnotationDocument> {
    proptest::collection::vec(arb_object(), 0..=max_objects)
        .prop_map(|objects| {
            objects
                .into_iter()
                .fold(AnnotationDocument::new("IMG_0001.jpg").with_size(640, 480), |doc, object| {
                    doc.with_object(object)
                })
        })
        .boxed()
}

/// Disjoint clusters drawn from the integer codes 0..100.
pub fn arb_clusters() -> BoxedStrategy<Vec<Vec<LabelValue>>> {
    proptest::collection::btree_set(0i64..100, 0..20)
        .prop_flat_map(|codes| {
            let codes: Vec<i64> = codes.into_iter().collect();
            let len = codes.len();
            (Just(codes), proptest::collection::vec(1usize..4, len))
        })
        .prop_map(|(codes, sizes)| {
            let mut clusters = Vec::new();
            let mut rest = codes.as_slice();
            for size in sizes {
                if rest.is_empty() {
                    break;
                }
                let take = size.min(rest.len());
                clusters.push(rest[..take].iter().copied().map(LabelValue::from).collect());
                rest = &rest[take..];
            }
            clusters
        })
        .boxed()
}

pub fn assert_bbox_close(a: &BoundingBox, b: &BoundingBox, eps: f64) -> Result<(), String> {
    let pairs = [
        (a.xmin, b.xmin),
        (a.ymin, b.ymin),
        (a.xmax, b.xmax),
        (a.ymax, b.ymax),
    ];
    if pairs.iter().all(|(x, y)| (x - y).abs() <= eps) {
        Ok(())
    } else {
        Err(format!("bbox mismatch: {a:?} vs {b:?}"))
    }
}
