// Local-alignment scoring kernel.
//
// The dynamic-programming grid is walked by anti-diagonal: at step d every
// cell (i, j) with i + j == d depends only on cells from diagonals d-1 (top
// and left neighbors) and d-2 (the diagonal neighbor, which sits two steps
// back in the wavefront schedule). That lets the whole grid collapse into
// two rolling score buffers plus a per-slot running maximum, sized to the
// sequence capacity rather than the full grid.
//
// Scoring: match +1, mismatch and gap -1, floored at 0 (the local-alignment
// reset), maximized over every cell.

use crate::codec::{PackedSequence, MAX_SEQ_LEN};

/// A score is bounded by the sequence capacity, so one signed byte holds it.
pub type Score = i8;

// Gap/mismatch decay: scores never go below the local-alignment floor.
#[inline(always)]
fn decay(score: Score) -> Score {
    if score == 0 { 0 } else { score - 1 }
}

/// Best local-alignment score between two packed sequences.
///
/// Fast path: two full-capacity sequences with identical packed words score
/// the capacity without running the recurrence. Identical sequences shorter
/// than capacity are not eligible and take the normal path.
pub fn local_score(a: &PackedSequence, b: &PackedSequence) -> Score {
    if a.len() == MAX_SEQ_LEN && b.len() == MAX_SEQ_LEN && a.word() == b.word() {
        return MAX_SEQ_LEN as Score;
    }

    let a_len = a.len();
    let b_len = b.len();
    if a_len == 0 || b_len == 0 {
        return 0;
    }

    let seq_a = a.symbols();
    let seq_b = b.symbols();

    // Slot j tracks the cell at query index j on the current diagonal.
    // `scores` holds diagonal d-1, `old_scores` diagonal d-2.
    let mut scores = [0 as Score; MAX_SEQ_LEN];
    let mut old_scores = [0 as Score; MAX_SEQ_LEN];
    let mut max_scores = [0 as Score; MAX_SEQ_LEN];

    let total_diagonals = a_len + b_len - 1;

    for d in 0..total_diagonals {
        // Descending j so that scores[j-1] and old_scores[j-1] still hold
        // their previous-diagonal values when slot j reads them.
        for j in (0..MAX_SEQ_LEN).rev() {
            let previous = scores[j];

            // Cell (j, d - j): active only inside the a_len x b_len grid.
            // Inactive cells contribute 0 and never touch the running max.
            let new_score = if j < a_len && d >= j && d - j < b_len {
                let k = d - j;
                let top = if k == 0 { 0 } else { decay(scores[j]) };
                let left = if j == 0 { 0 } else { decay(scores[j - 1]) };
                let diag = if j == 0 || k == 0 { 0 } else { old_scores[j - 1] };
                let hit = if seq_a[j] == seq_b[k] {
                    diag + 1
                } else {
                    decay(diag)
                };
                let best = top.max(left).max(hit);
                if best > max_scores[j] {
                    max_scores[j] = best;
                }
                best
            } else {
                0
            };

            old_scores[j] = previous;
            scores[j] = new_score;
        }
    }

    // Order-independent reduction over the per-slot maxima.
    max_scores.iter().copied().max().unwrap_or(0)
}
