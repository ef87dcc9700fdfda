// Parity tests for the wavefront alignment kernel: the anti-diagonal
// schedule must produce exactly the same scores as a plain row-by-row
// dynamic program over the identical recurrence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use seqmatch::alignment::local_score;
use seqmatch::codec::{PackedSequence, MAX_SEQ_LEN};

/// Row-by-row reference implementation of the same recurrence:
/// match +1, mismatch/gap -1, floored at 0, maximized over every cell.
fn reference_score(a: &PackedSequence, b: &PackedSequence) -> i8 {
    let a_len = a.len();
    let b_len = b.len();
    let mut grid = vec![vec![0i32; b_len + 1]; a_len + 1];
    let mut best = 0i32;
    for i in 1..=a_len {
        for j in 1..=b_len {
            let diagonal = grid[i - 1][j - 1]
                + if a.symbol(i - 1) == b.symbol(j - 1) {
                    1
                } else {
                    -1
                };
            let cell = 0.max(grid[i - 1][j] - 1).max(grid[i][j - 1] - 1).max(diagonal);
            grid[i][j] = cell;
            best = best.max(cell);
        }
    }
    best as i8
}

fn seq(text: &str) -> PackedSequence {
    PackedSequence::pack(text.as_bytes()).unwrap()
}

fn random_seq(rng: &mut StdRng, len: usize) -> PackedSequence {
    const ALPHABET: [u8; 4] = [b'A', b'T', b'G', b'C'];
    let text: Vec<u8> = (0..len).map(|_| ALPHABET[rng.gen_range(0..4)]).collect();
    PackedSequence::pack(&text).unwrap()
}

#[test]
fn wavefront_matches_reference_on_hand_picked_pairs() {
    let cases = [
        ("", ""),
        ("A", ""),
        ("A", "A"),
        ("A", "T"),
        ("ACGT", "ACGT"),
        ("ACGT", "ACGA"),
        ("ACGT", "TGCA"),
        ("AAAA", "TTTT"),
        ("ATATATAT", "TATATATA"),
        ("ACGTACGTACGTACGT", "ACGT"),
        ("GGGGGGGG", "GGG"),
        ("ATGCATGCATGCATGCATGCATGCATGCATGC", "CGTACGTACGTACGTACGTACGTACGTACGTA"),
    ];
    for (a, b) in cases {
        let (a, b) = (seq(a), seq(b));
        assert_eq!(
            local_score(&a, &b),
            reference_score(&a, &b),
            "mismatch for {:?} vs {:?}",
            a.unpack(),
            b.unpack()
        );
    }
}

#[test]
fn wavefront_matches_reference_on_all_length_combinations() {
    let mut rng = StdRng::seed_from_u64(1729);
    for a_len in 0..=MAX_SEQ_LEN {
        for b_len in 0..=MAX_SEQ_LEN {
            let a = random_seq(&mut rng, a_len);
            let b = random_seq(&mut rng, b_len);
            assert_eq!(
                local_score(&a, &b),
                reference_score(&a, &b),
                "mismatch for lengths {a_len}/{b_len}: {:?} vs {:?}",
                a.unpack(),
                b.unpack()
            );
        }
    }
}

#[test]
fn wavefront_matches_reference_on_random_pairs() {
    let mut rng = StdRng::seed_from_u64(20240117);
    for _ in 0..2000 {
        let a_len = rng.gen_range(0..=MAX_SEQ_LEN);
        let b_len = rng.gen_range(0..=MAX_SEQ_LEN);
        let a = random_seq(&mut rng, a_len);
        let b = random_seq(&mut rng, b_len);
        assert_eq!(
            local_score(&a, &b),
            reference_score(&a, &b),
            "mismatch for {:?} vs {:?}",
            a.unpack(),
            b.unpack()
        );
    }
}

#[test]
fn full_capacity_exact_match_scores_capacity() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let s = random_seq(&mut rng, MAX_SEQ_LEN);
        assert_eq!(local_score(&s, &s), MAX_SEQ_LEN as i8);
        // The shortcut and the recurrence must agree
        assert_eq!(reference_score(&s, &s), MAX_SEQ_LEN as i8);
    }
}

#[test]
fn empty_overlap_scores_zero() {
    let empty = seq("");
    let full = seq("ACGTACGTACGTACGTACGTACGTACGTACGT");
    assert_eq!(local_score(&empty, &full), 0);
    assert_eq!(local_score(&full, &empty), 0);
}

#[test]
fn single_mismatch_scenario() {
    // The end-to-end scenario pair: one substitution at the last position
    // leaves the three-match run intact.
    assert_eq!(local_score(&seq("ACGT"), &seq("ACGT")), 4);
    assert_eq!(local_score(&seq("ACGA"), &seq("ACGT")), 3);
}
