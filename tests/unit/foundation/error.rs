use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ArchiveError::structural("x")
            .to_string()
            .contains("structural error:")
    );
    assert!(ArchiveError::format("x").to_string().contains("format error:"));
    assert!(
        ArchiveError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
    assert!(ArchiveError::decode("x").to_string().contains("decode error:"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ArchiveError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn json_errors_map_to_serde_variant() {
    let err: ArchiveError = serde_json::from_str::<serde_json::Value>("{")
        .unwrap_err()
        .into();
    assert!(matches!(err, ArchiveError::Serde(_)));
}

#[test]
fn constructors_build_their_variant() {
    assert!(matches!(ArchiveError::structural("x"), ArchiveError::Structural(m) if m == "x"));
    assert!(matches!(ArchiveError::format("x"), ArchiveError::Format(_)));
    assert!(matches!(ArchiveError::serde("x"), ArchiveError::Serde(_)));
    assert!(matches!(ArchiveError::decode("x"), ArchiveError::Decode(_)));
}
