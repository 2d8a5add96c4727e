//! Rebasing and position-mapping behavior across concurrent edits

mod common;

use anyhow::Result;
use common::TestSchema;
use vellum_transform::{Mapping, Step, Transform};

#[test]
fn concurrent_steps_rebase_through_mapping() -> Result<()> {
    let ts = TestSchema::new();
    let base = ts.doc(vec![ts.p(vec![ts.text("abcd")])]);

    // author A deletes "b"
    let mut a = Transform::new(base.clone());
    a.delete(2, 3)?;

    // author B inserts "Z" before "d", expressed against the base version
    let mut b = Transform::new(base);
    b.insert(4, ts.text("Z"))?;

    // rebase B's step onto A's result
    let step_b = b.steps()[0].clone();
    let rebased = step_b.map(a.mapping()).expect("step survives rebasing");
    let mut merged = Transform::new(a.doc().clone());
    merged.step(rebased)?;

    assert_eq!(
        *merged.doc(),
        ts.doc(vec![ts.p(vec![ts.text("acZd")])])
    );
    Ok(())
}

#[test]
fn step_mapped_through_deleting_step_disappears() {
    let ts = TestSchema::new();
    let base = ts.doc(vec![ts.p(vec![ts.text("abcd")])]);

    // author A marks "bc" while author B deletes it
    let mut a = Transform::new(base.clone());
    a.add_mark(2, 4, ts.em()).unwrap();
    let mark_step = a.steps()[0].clone();

    let mut b = Transform::new(base);
    b.delete(2, 4).unwrap();

    assert!(mark_step.map(b.mapping()).is_none());
}

#[test]
fn mirrored_inverse_pair_round_trips_positions() {
    let ts = TestSchema::new();
    let base = ts.doc(vec![ts.p(vec![ts.text("abcd")])]);

    let mut tr = Transform::new(base.clone());
    tr.delete(2, 4).unwrap();
    let step = tr.steps()[0].clone();
    let inverse = step.invert(&tr.docs()[0]).unwrap();

    // a mapping containing a step map and its mirrored inverse behaves as
    // the identity, even for positions inside the deleted range
    let mut mapping = Mapping::new();
    let del = mapping.append_map(step.get_map());
    let ins = mapping.append_map(inverse.get_map());
    mapping.set_mirror(del, ins);

    for pos in 0..=base.content().size() {
        assert_eq!(mapping.map(pos, 1), pos, "position {} round-trips", pos);
    }

    // without the mirror annotation, interior positions collapse
    let mut bare = Mapping::new();
    bare.append_map(step.get_map());
    bare.append_map(inverse.get_map());
    assert_ne!(bare.map(3, 1), 3);
}

#[test]
fn invert_and_reapply_across_a_step_sequence() -> Result<()> {
    let ts = TestSchema::new();
    let base = ts.doc(vec![ts.p(vec![ts.text("one")]), ts.p(vec![ts.text("two")])]);

    let mut tr = Transform::new(base.clone());
    tr.insert(4, ts.text("!"))?;
    tr.delete(1, 2)?;
    tr.add_mark(1, 4, ts.em())?;

    let mut current = tr.doc().clone();
    let mut inverses: Vec<Step> = Vec::new();
    for (i, step) in tr.steps().iter().enumerate() {
        inverses.push(step.invert(&tr.docs()[i])?);
    }
    for inverse in inverses.iter().rev() {
        current = inverse.apply(&current)?;
    }
    assert_eq!(current, base);
    Ok(())
}

#[test]
fn mapping_invert_matches_mirrored_traversal() {
    let ts = TestSchema::new();
    let base = ts.doc(vec![ts.p(vec![ts.text("abcdef")])]);

    let mut tr = Transform::new(base.clone());
    tr.delete(2, 4).unwrap();
    tr.insert(3, ts.text("xy")).unwrap();

    let inverted = tr.mapping().invert();
    // positions that survive the forward mapping come back exactly
    for pos in [0, 1, 2, 5, 6] {
        let mapped = tr.mapping().map(pos, -1);
        assert_eq!(inverted.map(mapped, -1), pos, "position {}", pos);
    }
}
