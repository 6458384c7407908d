//! Cross-thread writer/reader scenarios over one store.

use std::io::Write;
use std::sync::Arc;
use std::thread;
use tagtree_core::{TreeReader, TreeWriter};
use tempfile::tempdir;

const BLOBS: i64 = 200;

#[test]
fn readers_never_observe_partial_commits() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let mut writer = TreeWriter::open(&path).unwrap();
    // The files must exist before a reader can open them.
    let mut sink = writer.write_next(0).unwrap();
    sink.write_all(b"0").unwrap();
    sink.close().unwrap();

    let reader = Arc::new(TreeReader::open(&path).unwrap());

    let mut pollers = Vec::new();
    for _ in 0..4 {
        let reader = Arc::clone(&reader);
        pollers.push(thread::spawn(move || {
            let mut newest_seen = 0i64;
            loop {
                // The newest committed blob; must only ever move forward,
                // and must always have a fully readable payload.
                let blob = reader.floor(i64::MAX).unwrap().unwrap();
                assert!(blob.tag() >= newest_seen, "tags went backwards");
                assert_eq!(blob.payload(), blob.tag().to_string().as_bytes());
                newest_seen = blob.tag();
                if newest_seen == BLOBS {
                    return;
                }
            }
        }));
    }

    for tag in 1..=BLOBS {
        let mut sink = writer.write_next(tag).unwrap();
        sink.write_all(tag.to_string().as_bytes()).unwrap();
        sink.close().unwrap();
    }

    for poller in pollers {
        poller.join().unwrap();
    }
    writer.close().unwrap();

    // Nothing was lost along the way.
    let blobs = reader.range(i64::MIN, i64::MAX).unwrap();
    assert_eq!(blobs.len(), BLOBS as usize + 1);
}

#[test]
fn point_lookups_race_with_appends() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let mut writer = TreeWriter::open(&path).unwrap();
    let mut sink = writer.write_next(0).unwrap();
    sink.write_all(b"0").unwrap();
    sink.close().unwrap();

    let reader = Arc::new(TreeReader::open(&path).unwrap());
    let lookup = {
        let reader = Arc::clone(&reader);
        thread::spawn(move || {
            // Every tag that a lookup finds must round-trip its payload,
            // whenever the lookup happens to run.
            while reader.at(BLOBS).unwrap().is_none() {
                for tag in (0..=BLOBS).step_by(17) {
                    if let Some(blob) = reader.at(tag).unwrap() {
                        assert_eq!(blob.tag(), tag);
                        assert_eq!(blob.payload(), tag.to_string().as_bytes());
                    }
                }
            }
        })
    };

    for tag in 1..=BLOBS {
        let mut sink = writer.write_next(tag).unwrap();
        sink.write_all(tag.to_string().as_bytes()).unwrap();
        sink.close().unwrap();
    }

    lookup.join().unwrap();
    writer.close().unwrap();
}

#[test]
fn late_readers_see_the_full_session() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let mut writer = TreeWriter::open(&path).unwrap();
    for tag in 1..=50i64 {
        let mut sink = writer.write_next(tag).unwrap();
        sink.write_all(&tag.to_be_bytes()).unwrap();
        sink.close().unwrap();
    }

    // Opened mid-session, after the commits above.
    let live = TreeReader::open(&path).unwrap();
    assert_eq!(live.range(i64::MIN, i64::MAX).unwrap().len(), 50);

    writer.close().unwrap();

    // Opened after the writer is gone; same view.
    let reopened = TreeReader::open(&path).unwrap();
    let blobs = reopened.range(i64::MIN, i64::MAX).unwrap();
    assert_eq!(blobs.len(), 50);
    for (i, blob) in blobs.iter().enumerate() {
        let tag = i as i64 + 1;
        assert_eq!(blob.tag(), tag);
        assert_eq!(blob.payload(), tag.to_be_bytes().as_slice());
    }
}
