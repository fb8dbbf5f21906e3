use ics_core::merge::{merge_files, merge_partial_indexes};
use ics_core::persist::{
    load_lexicon, prepare_output_layout, read_postings_at, IndexPaths, RecordReader, RecordWriter,
};
use ics_core::{IndexError, Posting, TermPostings};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn p(doc_id: u32, tf: u32) -> Posting {
    Posting { doc_id, tf, important_hits: 0 }
}

fn write_partial(path: &Path, records: &[(&str, Vec<Posting>)]) -> u64 {
    let mut w = RecordWriter::create(path).unwrap();
    for (term, postings) in records {
        w.append(&TermPostings { term: term.to_string(), postings: postings.clone() }).unwrap();
    }
    w.finish().unwrap()
}

fn setup() -> (tempfile::TempDir, IndexPaths) {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    prepare_output_layout(&paths).unwrap();
    (dir, paths)
}

#[test]
fn shared_terms_concatenate_in_partial_order() {
    let (_dir, paths) = setup();
    write_partial(&paths.partial(0), &[("apple", vec![p(0, 1), p(1, 2)]), ("kiwi", vec![p(1, 1)])]);
    write_partial(&paths.partial(1), &[("apple", vec![p(2, 4)]), ("banana", vec![p(3, 1)])]);
    write_partial(&paths.partial(2), &[("apple", vec![p(5, 1)]), ("kiwi", vec![p(4, 3)]), ("zucchini", vec![p(5, 1)])]);

    let summary = merge_partial_indexes(&paths).unwrap();
    assert_eq!(summary.partials, 3);
    assert_eq!(summary.terms, 4);
    assert_eq!(summary.postings, 7);

    let lexicon = load_lexicon(&paths).unwrap();
    let terms: Vec<&str> = lexicon.iter().map(|e| e.term.as_str()).collect();
    assert_eq!(terms, vec!["apple", "banana", "kiwi", "zucchini"]);

    let apple = read_postings_at(&paths, lexicon[0].offset).unwrap();
    assert_eq!(apple.postings, vec![p(0, 1), p(1, 2), p(2, 4), p(5, 1)]);
    let kiwi = read_postings_at(&paths, lexicon[2].offset).unwrap();
    assert_eq!(kiwi.postings, vec![p(1, 1), p(4, 3)]);

    // Lexicon offsets match a sequential scan of the postings file.
    let mut reader = RecordReader::open(paths.postings()).unwrap();
    let mut i = 0;
    while let Some((offset, rec)) = reader.next_record::<TermPostings>().unwrap() {
        assert_eq!((offset, rec.term.as_str()), (lexicon[i].offset, lexicon[i].term.as_str()));
        i += 1;
    }
    assert_eq!(i, lexicon.len());
    assert_eq!(summary.postings_bytes, fs::metadata(paths.postings()).unwrap().len());
}

#[test]
fn single_partial_passes_through() {
    let (_dir, paths) = setup();
    write_partial(&paths.partial(0), &[("a", vec![p(0, 1)]), ("b", vec![p(0, 2)])]);
    merge_partial_indexes(&paths).unwrap();
    assert_eq!(fs::read(paths.partial(0)).unwrap(), fs::read(paths.postings()).unwrap());
}

#[test]
fn no_partials_yields_empty_outputs() {
    let (_dir, paths) = setup();
    let summary = merge_partial_indexes(&paths).unwrap();
    assert_eq!(summary.terms, 0);
    assert_eq!(fs::metadata(paths.postings()).unwrap().len(), 0);
    assert_eq!(fs::metadata(paths.lexicon()).unwrap().len(), 0);
}

#[test]
fn truncated_partial_names_file_and_offset() {
    let (_dir, paths) = setup();
    write_partial(&paths.partial(0), &[("a", vec![p(0, 1)])]);
    let bad = paths.partial(1);
    let len = write_partial(&bad, &[("a", vec![p(1, 1)]), ("b", vec![p(1, 1)])]);
    OpenOptions::new().write(true).open(&bad).unwrap().set_len(len - 2).unwrap();

    match merge_partial_indexes(&paths) {
        Err(IndexError::CorruptRecord { path, offset, .. }) => {
            assert_eq!(path, bad);
            assert!(offset > 0);
        }
        other => panic!("expected corrupt record, got {other:?}"),
    }
    // Output written before the failure stays in place.
    assert!(fs::metadata(paths.postings()).unwrap().len() > 0);
}

#[test]
fn unsorted_partial_is_an_invariant_violation() {
    let (_dir, paths) = setup();
    write_partial(&paths.partial(0), &[("pear", vec![p(0, 1)]), ("apple", vec![p(0, 1)])]);
    let err = merge_partial_indexes(&paths).unwrap_err();
    match err {
        IndexError::TermOrder { previous, term, path, .. } => {
            assert_eq!((previous.as_str(), term.as_str()), ("pear", "apple"));
            assert_eq!(path, paths.partial(0));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn repeated_term_in_one_partial_is_rejected() {
    let (_dir, paths) = setup();
    write_partial(&paths.partial(0), &[("a", vec![p(0, 1)]), ("a", vec![p(1, 1)])]);
    assert!(matches!(merge_partial_indexes(&paths), Err(IndexError::TermOrder { .. })));
}

#[test]
fn duplicate_doc_across_partials_is_rejected() {
    let (_dir, paths) = setup();
    write_partial(&paths.partial(0), &[("a", vec![p(3, 1)])]);
    write_partial(&paths.partial(1), &[("a", vec![p(3, 2)])]);
    match merge_partial_indexes(&paths) {
        Err(IndexError::DuplicatePosting { term, doc_id, .. }) => assert_eq!((term.as_str(), doc_id), ("a", 3)),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn out_of_order_partials_are_not_resorted() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.bin");
    let second = dir.path().join("second.bin");
    write_partial(&first, &[("a", vec![p(5, 1)])]);
    write_partial(&second, &[("a", vec![p(1, 1)])]);
    let files: Vec<PathBuf> = vec![first, second];
    let err = merge_files(&files, &dir.path().join("out.postings"), &dir.path().join("out.lexicon")).unwrap_err();
    assert!(matches!(err, IndexError::DocOrder { previous: 5, doc_id: 1, .. }));
}
