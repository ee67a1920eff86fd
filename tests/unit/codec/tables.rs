use super::*;
use crate::container::AttrValue;

#[test]
fn compound_points_read_with_defaults_for_missing_columns() {
    let table = Table::new()
        .with_column("x", Column::F64(vec![1.0, 2.0]))
        .with_column("y", Column::F64(vec![3.0, 4.0]))
        .with_column("visible", Column::Bool(vec![true, false]));
    let ds = Dataset::vector(Data::Compound(table));
    let view = TableView::new(POINTS, &ds).unwrap();
    let rows = read_point_rows(&view).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].x, 2.0);
    assert!(!rows[1].visible);
    assert!(!rows[0].complete);
    assert_eq!(rows[0].score, 0.0);
}

#[test]
fn matrix_table_uses_field_names_attribute() {
    let ds = Dataset::with_shape(
        Data::F64(vec![0.0, 0.0, 5.0, 0.0, 2.0, 1.0, 0.0, 9.0, 2.0, 3.0]),
        vec![2, 5],
    )
    .with_attr(
        "field_names",
        AttrValue::StrList(
            [
                "frame_id",
                "video",
                "frame_idx",
                "instance_id_start",
                "instance_id_end",
            ]
            .map(String::from)
            .to_vec(),
        ),
    );
    let view = TableView::new(FRAMES, &ds).unwrap();
    let rows = read_frame_rows(&view).unwrap();
    assert_eq!(
        rows[1],
        FrameRow {
            frame_id: 1,
            video: 0,
            frame_idx: 9,
            instance_start: 2,
            instance_end: 3,
        }
    );
}

#[test]
fn matrix_without_field_names_is_rejected() {
    let ds = Dataset::with_shape(Data::F64(vec![0.0; 4]), vec![2, 2]);
    assert!(TableView::new(POINTS, &ds).is_err());
}

#[test]
fn missing_required_column_is_reported_by_name() {
    let ds = Dataset::vector(Data::Compound(
        Table::new().with_column("x", Column::F64(vec![1.0])),
    ));
    let view = TableView::new(POINTS, &ds).unwrap();
    let err = read_point_rows(&view).unwrap_err().to_string();
    assert!(err.contains("'y'"));
}

#[test]
fn instance_rows_default_optional_tracking_score() {
    let mut cols = InstanceColumns::default();
    cols.push(InstanceRow {
        instance_id: 0,
        instance_type: INSTANCE_TYPE_PREDICTED,
        frame_id: 0,
        skeleton: 0,
        track: -1,
        from_predicted: -1,
        score: 0.5,
        point_start: 0,
        point_end: 2,
        tracking_score: 0.25,
    });
    let mut table = cols.into_table();
    let ts = table.fields.iter().position(|f| f == "tracking_score").unwrap();
    table.fields.remove(ts);
    table.columns.remove(ts);
    let ds = Dataset::vector(Data::Compound(table));
    let rows = read_instance_rows(&TableView::new(INSTANCES, &ds).unwrap()).unwrap();
    assert_eq!(rows[0].tracking_score, 0.0);
    assert_eq!(rows[0].score, 0.5);
    assert_eq!(rows[0].point_end, 2);
}

#[test]
fn field_without_a_column_reads_as_default() {
    let table = Table {
        fields: ["x", "y", "visible"].map(String::from).to_vec(),
        columns: vec![Column::F64(vec![1.0, 2.0])],
    };
    let ds = Dataset::vector(Data::Compound(table));
    let view = TableView::new(POINTS, &ds).unwrap();
    let rows = read_point_rows(&view).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].x, 2.0);
    assert!(rows[1].y.is_nan());
    assert!(rows[1].visible);
}
