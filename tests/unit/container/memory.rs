use super::*;
use crate::container::Data;

#[test]
fn datasets_create_parent_groups() {
    let mut c = MemContainer::new();
    c.write_dataset("video0/video", Dataset::vector(Data::U8(vec![1, 2, 3])))
        .unwrap();
    assert!(matches!(c.get("video0"), Some(Entity::Group { .. })));
    assert_eq!(c.keys("video0"), vec!["video".to_string()]);
    assert_eq!(c.keys(""), vec!["video0".to_string()]);
    assert!(c.dataset("/video0/video").is_some());
    assert!(c.dataset("video0").is_none());
}

#[test]
fn keys_lists_direct_children_only() {
    let mut c = MemContainer::new();
    c.create_group("a/b/c").unwrap();
    c.write_dataset("a/x", Dataset::vector(Data::I64(vec![1])))
        .unwrap();
    let mut keys = c.keys("a");
    keys.sort();
    assert_eq!(keys, vec!["b".to_string(), "x".to_string()]);
}

#[test]
fn attributes_on_groups_and_datasets() {
    let mut c = MemContainer::new();
    c.create_group("metadata").unwrap();
    c.set_attr("metadata", "format_id", AttrValue::Float(1.4))
        .unwrap();
    c.write_dataset("frames", Dataset::vector(Data::I64(vec![])))
        .unwrap();
    c.set_attr("frames", "note", AttrValue::Str("x".into()))
        .unwrap();
    assert_eq!(
        c.attrs("metadata").get("format_id"),
        Some(&AttrValue::Float(1.4))
    );
    assert_eq!(
        c.dataset("frames").unwrap().attr("note"),
        Some(&AttrValue::Str("x".into()))
    );
    assert!(c.set_attr("missing", "a", AttrValue::Int(1)).is_err());
}

#[test]
fn dataset_under_dataset_is_rejected() {
    let mut c = MemContainer::new();
    c.write_dataset("a", Dataset::vector(Data::I64(vec![1])))
        .unwrap();
    assert!(c.write_dataset("a/b", Dataset::vector(Data::I64(vec![1]))).is_err());
}

#[test]
fn remove_drops_subtree() {
    let mut c = MemContainer::new();
    c.write_dataset("v/a", Dataset::vector(Data::I64(vec![1])))
        .unwrap();
    c.write_dataset("vv", Dataset::vector(Data::I64(vec![1])))
        .unwrap();
    c.remove("v").unwrap();
    assert!(!c.contains("v"));
    assert!(!c.contains("v/a"));
    assert!(c.contains("vv"));
}

#[test]
fn json_snapshot_round_trip() {
    let tmp = std::env::temp_dir().join(format!(
        "slp_io_mem_snapshot_{}_{}.json",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let mut c = MemContainer::new();
    c.write_dataset(
        "tracks_json",
        Dataset::vector(Data::Str(vec!["[0, \"a\"]".into()])),
    )
    .unwrap();
    c.save_json(&tmp).unwrap();
    let back = MemContainer::load_json(&tmp).unwrap();
    assert_eq!(
        back.dataset("tracks_json").unwrap().strings().unwrap(),
        &["[0, \"a\"]".to_string()]
    );
    std::fs::remove_file(&tmp).ok();
}

#[test]
fn json_snapshot_keeps_nan_coordinates() {
    let c = {
        let mut c = MemContainer::new();
        c.write_dataset("points", Dataset::vector(Data::F64(vec![1.5, f64::NAN])))
            .unwrap();
        c
    };
    let text = serde_json::to_string(&c).unwrap();
    assert!(text.contains("null"));
    let back: MemContainer = serde_json::from_str(&text).unwrap();
    let Data::F64(v) = &back.dataset("points").unwrap().data else {
        panic!("expected f64 data");
    };
    assert_eq!(v[0], 1.5);
    assert!(v[1].is_nan());
}
