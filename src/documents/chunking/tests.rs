use super::split_keeping_separator as split_keeping_separator_impl;
use super::*;

fn splitter(chunk_size: usize, chunk_overlap: usize) -> RecursiveSplitter {
    RecursiveSplitter::new(&ChunkingConfig {
        chunk_size,
        chunk_overlap,
    })
}

#[test]
fn default_config() {
    let config = ChunkingConfig::default();
    assert_eq!(config.chunk_size, 500);
    assert_eq!(config.chunk_overlap, 50);
}

#[test]
fn chunk_id_format() {
    let id = chunk_id("my doc.txt", 0);
    assert!(id.starts_with("my_doc_txt_"));
    assert!(id.ends_with("__chunk_0"));
    assert_eq!(id.len(), "my_doc_txt_".len() + 8 + "__chunk_0".len());

    assert!(chunk_id("report.v2.pdf", 12).ends_with("__chunk_12"));
    assert_eq!(chunk_id("notes", 3), chunk_id("notes", 3));
}

#[test]
fn chunk_ids_differ_for_names_with_the_same_readable_prefix() {
    let names = ["my report.txt", "my_report.txt", "my.report.txt", "my_report_txt"];
    let ids: Vec<String> = names.iter().map(|name| chunk_id(name, 0)).collect();

    for (i, a) in ids.iter().enumerate() {
        for b in ids.iter().skip(i + 1) {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn separator_attaches_to_following_piece() {
    assert_eq!(
        split_keeping_separator_impl("a b  c", " "),
        vec!["a", " b", " ", " c"]
    );
    assert_eq!(
        split_keeping_separator_impl(" lead", " "),
        vec![" lead"]
    );
    assert_eq!(split_keeping_separator_impl("héj", ""), vec!["h", "é", "j"]);
}

#[test]
fn words_split_without_overlap() {
    assert_eq!(
        splitter(9, 0).split_text("aaaa bbbb cccc"),
        vec!["aaaa bbbb", "cccc"]
    );
}

#[test]
fn words_split_with_overlap() {
    assert_eq!(
        splitter(10, 5).split_text("aaaa bbbb cccc"),
        vec!["aaaa bbbb", "bbbb cccc"]
    );
}

#[test]
fn short_text_is_single_chunk() {
    assert_eq!(
        splitter(100, 10).split_text("para one.\n\npara two."),
        vec!["para one.\n\npara two."]
    );
}

#[test]
fn newline_preferred_over_spaces() {
    assert_eq!(
        splitter(15, 0).split_text("first line\nsecond line"),
        vec!["first line", "second line"]
    );
}

#[test]
fn unbroken_text_falls_back_to_characters() {
    let chunks = splitter(10, 0).split_text(&"x".repeat(25));
    assert_eq!(
        chunks,
        vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]
    );
}

#[test]
fn chunks_respect_size_bound() {
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(50)
        + "\n\nSecond paragraph, with commas, and more words to split on.\n"
        + &"Zażółć gęślą jaźń ".repeat(20);

    for (size, overlap) in [(20, 0), (50, 10), (100, 20), (500, 50)] {
        let chunks = splitter(size, overlap).split_text(&text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= size,
                "chunk of {} chars exceeds {size}: {chunk:?}",
                chunk.chars().count()
            );
            assert_eq!(chunk.trim(), chunk);
            assert!(!chunk.is_empty());
        }
    }
}

#[test]
fn chunking_is_deterministic() {
    let text = "Alpha beta gamma. Delta epsilon, zeta eta.\n\nTheta iota kappa lambda mu. "
        .repeat(30);
    let config = ChunkingConfig {
        chunk_size: 120,
        chunk_overlap: 30,
    };

    let first = chunk_text(&text, "greek.txt", &config);
    let second = chunk_text(&text, "greek.txt", &config);
    assert_eq!(first, second);
}

#[test]
fn overlap_carries_text_forward() {
    let text = (0..40).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
    let chunks = splitter(50, 15).split_text(&text);
    assert!(chunks.len() > 2);

    for pair in chunks.windows(2) {
        let previous_last_word = pair[0]
            .split(' ')
            .next_back()
            .expect("chunk has words");
        assert!(
            pair[1].split(' ').any(|word| word == previous_last_word),
            "{:?} should repeat {:?}",
            pair[1],
            previous_last_word
        );
    }
}

#[test]
fn chunk_document_stamps_metadata() {
    let config = ChunkingConfig {
        chunk_size: 30,
        chunk_overlap: 0,
    };
    let text = "One sentence here. Another sentence there. A third one follows.";
    let chunks = chunk_text(text, "my doc.txt", &config);

    assert!(chunks.len() > 1);
    let total = chunks.len();
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.source, "my doc.txt");
        assert_eq!(chunk.chunk_index, i);
        assert_eq!(chunk.total_chunks, total);
        assert_eq!(chunk.chunk_id, chunk_id("my doc.txt", i));
    }

    let mut ids: Vec<_> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
    ids.dedup();
    assert_eq!(ids.len(), total);
}

#[test]
fn blank_text_yields_no_chunks() {
    let config = ChunkingConfig::default();
    assert!(chunk_text("", "empty.txt", &config).is_empty());
    assert!(chunk_text("  \n\n\t ", "empty.txt", &config).is_empty());
}

#[test]
fn custom_separators() {
    let chunks = splitter(12, 0)
        .with_separators(vec!["|".to_string(), String::new()])
        .split_text("alpha|beta|gamma|delta");
    assert_eq!(chunks, vec!["alpha|beta", "|gamma|delta"]);
}
