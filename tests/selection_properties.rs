use std::collections::HashMap;
use std::fs;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::tempdir;

use fortunes::{CorpusLayout, FortunePicker, PickerConfig};

fn write_db(root: &Path, name: &str, content: &str) {
    fs::write(root.join(name), content).unwrap();
    fs::write(root.join(format!("{name}.dat")), b"").unwrap();
}

/// `%\n` followed by `count` records, each terminated by a delimiter line.
fn db_content(records: impl IntoIterator<Item = String>) -> String {
    let mut content = String::from("%\n");
    for record in records {
        content.push_str(&record);
        content.push_str("\n%\n");
    }
    content
}

#[test]
fn larger_files_are_picked_in_proportion_to_their_bytes() {
    let temp = tempdir().unwrap();
    // Equal-width records: 31 in one file, 11 in the other. Every record but
    // the first in each file is reached from a full record's width of offsets,
    // so the big file should win 30 / (30 + 10) of the time.
    write_db(
        temp.path(),
        "big",
        &db_content((0..31).map(|idx| format!("a-{idx:018}"))),
    );
    write_db(
        temp.path(),
        "small",
        &db_content((0..11).map(|idx| format!("b-{idx:018}"))),
    );
    let picker = FortunePicker::from_root(temp.path());
    let mut rng = StdRng::seed_from_u64(2024);

    let mut from_big = 0usize;
    let mut total = 0usize;
    for _ in 0..4000 {
        if let Some(text) = picker.pick_with_rng(&mut rng, 1000).unwrap() {
            total += 1;
            if text.starts_with("a-") {
                from_big += 1;
            }
        }
    }
    assert!(total > 3900, "too many exhausted picks: {total}");
    let share = from_big as f64 / total as f64;
    assert!((share - 0.75).abs() < 0.04, "big file share {share:.3}");
}

#[test]
fn single_record_files_only_yield_their_own_records() {
    let temp = tempdir().unwrap();
    write_db(temp.path(), "a", "%\nhello\n%\n");
    write_db(temp.path(), "b", "%\nworld this is longer\n%\n");
    let picker = FortunePicker::from_root(temp.path());
    assert_eq!(picker.layout().total_size(), 10 + 25);

    let mut rng = StdRng::seed_from_u64(9);
    let mut counts: HashMap<Option<String>, usize> = HashMap::new();
    for _ in 0..2000 {
        let picked = picker.pick_with_rng(&mut rng, 1000).unwrap();
        *counts.entry(picked).or_default() += 1;
    }
    for key in counts.keys() {
        assert!(
            matches!(key.as_deref(), None | Some("hello") | Some("world this is longer")),
            "unexpected pick {key:?}"
        );
    }
    // Each record is only reachable from its file's first byte, so both show up
    // and a run of ten misses is common.
    assert!(counts.get(&Some("hello".to_string())).copied().unwrap_or(0) > 100);
    assert!(
        counts
            .get(&Some("world this is longer".to_string()))
            .copied()
            .unwrap_or(0)
            > 100
    );
    assert!(counts.get(&None).copied().unwrap_or(0) > 100);
}

#[test]
fn unmarked_files_are_never_picked() {
    let temp = tempdir().unwrap();
    write_db(
        temp.path(),
        "marked",
        &db_content((0..10).map(|idx| format!("marked {idx}"))),
    );
    let unmarked = db_content((0..200).map(|idx| format!("UNMARKED {idx}")));
    fs::write(temp.path().join("unmarked"), unmarked).unwrap();

    let picker = FortunePicker::from_root(temp.path());
    let mut rng = StdRng::seed_from_u64(4);
    let mut picked = 0;
    for _ in 0..500 {
        if let Some(text) = picker.pick_with_rng(&mut rng, 1000).unwrap() {
            assert!(text.starts_with("marked"), "picked {text:?}");
            picked += 1;
        }
    }
    assert!(picked > 400);
}

#[test]
fn length_filter_accepts_equal_and_rejects_longer() {
    let temp = tempdir().unwrap();
    let body = "x".repeat(40);
    write_db(
        temp.path(),
        "fixed",
        &db_content(std::iter::repeat_n(body.clone(), 30)),
    );
    let picker = FortunePicker::from_root(temp.path());
    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..50 {
        assert_eq!(
            picker.pick_with_rng(&mut rng, 40).unwrap().as_deref(),
            Some(body.as_str())
        );
    }
    for _ in 0..50 {
        assert_eq!(picker.pick_with_rng(&mut rng, 39).unwrap(), None);
    }
}

#[test]
fn oversized_corpus_exhausts_to_none() {
    let temp = tempdir().unwrap();
    write_db(
        temp.path(),
        "verbose",
        &db_content((0..20).map(|idx| format!("{idx} {}", "word ".repeat(50)))),
    );
    let picker = FortunePicker::new(PickerConfig::new(temp.path()));
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..20 {
        assert_eq!(picker.pick_with_rng(&mut rng, 100).unwrap(), None);
    }
}

#[test]
fn consecutive_scans_of_unchanged_corpus_agree() {
    let temp = tempdir().unwrap();
    fs::create_dir_all(temp.path().join("off")).unwrap();
    write_db(temp.path(), "art", "%\nbrush\n%\n");
    write_db(&temp.path().join("off"), "riddles", "%\nwhat\n%\nwho\n%\n");
    let picker = FortunePicker::from_root(temp.path());

    let first = picker.layout();
    let second = picker.layout();
    assert_eq!(first, second);
    assert_eq!(first.spans().len(), 2);
    assert_eq!(first.total_size(), 10 + 15);
}

#[test]
fn corpus_changes_are_seen_without_restart() {
    let temp = tempdir().unwrap();
    let picker = FortunePicker::from_root(temp.path());
    assert!(picker.layout().is_empty());
    assert_eq!(picker.pick(1000).unwrap(), None);

    write_db(
        temp.path(),
        "late",
        &db_content(std::iter::repeat_n("arrived late".to_string(), 20)),
    );
    let layout: CorpusLayout = picker.layout();
    assert_eq!(layout.spans().len(), 1);
    let mut rng = StdRng::seed_from_u64(31);
    assert_eq!(
        picker.pick_with_rng(&mut rng, 1000).unwrap().as_deref(),
        Some("arrived late")
    );
}
