use super::*;
use crate::model::instance::{Instance, Point, PredictedInstance, PredictedPoint};

fn two_node_labels() -> Labels {
    let mut labels = Labels::new();
    let skel = labels.add_skeleton(Skeleton::new(vec!["head".into(), "tail".into()]));
    let video = labels.add_video(Video::new("a.mp4"));
    let mut frame = LabeledFrame::new(video, 0);
    frame.instances.push(AnyInstance::Predicted(PredictedInstance::new(
        skel,
        vec![PredictedPoint::new(1.0, 2.0, 0.9); 2],
        0.8,
    )));
    let mut user = Instance::new(skel, vec![Point::new(1.0, 2.0); 2]);
    user.from_predicted = Some(InstanceRef::new(0, 0));
    frame.instances.push(AnyInstance::User(user));
    labels.labeled_frames.push(frame);
    labels
}

#[test]
fn integrity_holds_for_consistent_graph() {
    let labels = two_node_labels();
    labels.check_integrity().unwrap();
    assert_eq!(labels.num_instances(), 2);
    assert_eq!(labels.labeled_frames[0].user_instances().count(), 1);
}

#[test]
fn integrity_rejects_point_count_mismatch() {
    let mut labels = two_node_labels();
    let AnyInstance::User(u) = &mut labels.labeled_frames[0].instances[1] else {
        panic!("expected user instance");
    };
    u.points.pop();
    assert!(labels.check_integrity().is_err());
}

#[test]
fn integrity_rejects_link_to_user_instance() {
    let mut labels = two_node_labels();
    let AnyInstance::User(u) = &mut labels.labeled_frames[0].instances[1] else {
        panic!("expected user instance");
    };
    u.from_predicted = Some(InstanceRef::new(0, 1));
    assert!(labels.check_integrity().is_err());
}

#[test]
fn intern_track_deduplicates_by_name() {
    let mut labels = Labels::new();
    let a = labels.intern_track("mouse-1");
    let b = labels.intern_track("mouse-2");
    let c = labels.intern_track("mouse-1");
    assert_eq!(a, c);
    assert_ne!(a, b);
    assert_eq!(labels.tracks.len(), 2);
}
