/// A known primer sequence. The sequence is stored uppercased; `N` positions
/// match any read base.
pub struct Primer {
    pub id: String,
    pub seq: Vec<u8>,
}

/// Per-run scan settings.
#[derive(Clone, Copy)]
pub struct ScanParams {
    /// Number of bases presumed to form the UMI.
    pub umi_length: usize,
    /// Largest number of leading bases tried before the UMI; offsets
    /// 0..=max_offset are tried smallest-first.
    pub max_offset: usize,
    /// Inclusive mismatch ceiling for a primer to count as a match.
    pub max_mismatch: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No primer stayed within the mismatch ceiling at any offset.
    NoPrimerMatch,
    /// Two or more primers tied for the best score at the first offset
    /// where anything matched.
    AmbiguousMatch,
    /// The read never covered a full primer window at any offset.
    ReadTooShort,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RejectReason::NoPrimerMatch => "no primer match",
            RejectReason::AmbiguousMatch => "ambiguous primer match",
            RejectReason::ReadTooShort => "read too short",
        })
    }
}

/// Outcome of scanning one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipDecision {
    /// Remove the first `boundary` bases (`boundary == offset + umi_length`);
    /// the primer itself is kept. `primer` indexes into the primer set.
    Accepted {
        boundary: usize,
        offset: usize,
        primer: usize,
        mismatches: usize,
    },
    Rejected(RejectReason),
}

/// Count mismatches between `primer` and the read window starting at `start`.
/// Returns `None` when the read is too short to cover the window. Comparison
/// is case-insensitive; a primer `N` never counts as a mismatch.
pub fn mismatches(primer: &[u8], read: &[u8], start: usize) -> Option<usize> {
    let end = start.checked_add(primer.len())?;
    let window = read.get(start..end)?;
    let mut diff = 0usize;
    for (p, r) in primer.iter().zip(window) {
        if *p == b'N' {
            continue;
        }
        if !p.eq_ignore_ascii_case(r) {
            diff += 1;
        }
    }
    Some(diff)
}

/// Locate the primer following the UMI and decide where to clip `read`.
///
/// Offsets are tried in ascending order. The first offset where any primer
/// scores within `max_mismatch` is decisive: a unique best-scoring primer is
/// accepted, a tie is rejected as ambiguous. A tie never falls through to a
/// larger offset and no secondary criterion breaks it; guessing between
/// equally good primers would misassign the read.
pub fn scan(primers: &[Primer], read: &[u8], params: &ScanParams) -> ClipDecision {
    let mut any_window = false;
    for offset in 0..=params.max_offset {
        let start = offset + params.umi_length;
        let mut best: Option<(usize, usize)> = None; // (score, primer index)
        let mut tied = false;
        for (i, primer) in primers.iter().enumerate() {
            let score = match mismatches(&primer.seq, read, start) {
                Some(s) => s,
                None => continue,
            };
            any_window = true;
            if score > params.max_mismatch {
                continue;
            }
            match best {
                Some((b, _)) if score > b => {}
                Some((b, _)) if score == b => tied = true,
                _ => {
                    best = Some((score, i));
                    tied = false;
                }
            }
        }
        if tied {
            return ClipDecision::Rejected(RejectReason::AmbiguousMatch);
        }
        if let Some((score, i)) = best {
            return ClipDecision::Accepted {
                boundary: start,
                offset,
                primer: i,
                mismatches: score,
            };
        }
    }
    if any_window {
        ClipDecision::Rejected(RejectReason::NoPrimerMatch)
    } else {
        ClipDecision::Rejected(RejectReason::ReadTooShort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primer(id: &str, seq: &[u8]) -> Primer {
        Primer {
            id: id.to_string(),
            seq: seq.to_vec(),
        }
    }

    fn params(umi_length: usize, max_offset: usize, max_mismatch: usize) -> ScanParams {
        ScanParams {
            umi_length,
            max_offset,
            max_mismatch,
        }
    }

    #[test]
    fn mismatches_counts_differing_positions() {
        assert_eq!(mismatches(b"GATTACA", b"GATTACA", 0), Some(0));
        assert_eq!(mismatches(b"GATTACA", b"GATTAGA", 0), Some(1));
        assert_eq!(mismatches(b"GATTACA", b"XXGATTACA", 2), Some(0));
    }

    #[test]
    fn mismatches_short_window_is_incomparable() {
        assert_eq!(mismatches(b"GATTACA", b"GATTAC", 0), None);
        assert_eq!(mismatches(b"GATTACA", b"GATTACA", 1), None);
        assert_eq!(mismatches(b"GATTACA", b"", 0), None);
    }

    #[test]
    fn mismatches_is_case_insensitive_and_n_is_free() {
        assert_eq!(mismatches(b"GATTACA", b"gattaca", 0), Some(0));
        assert_eq!(mismatches(b"GANTANA", b"GATTACA", 0), Some(0));
    }

    #[test]
    fn exact_match_after_umi_is_accepted() {
        let primers = vec![primer("P1", b"GATTACA")];
        let read = b"AAAAAAGATTACATTTT";
        assert_eq!(
            scan(&primers, read, &params(6, 0, 0)),
            ClipDecision::Accepted {
                boundary: 6,
                offset: 0,
                primer: 0,
                mismatches: 0,
            }
        );
    }

    #[test]
    fn unique_minimum_beats_a_worse_competitor() {
        let primers = vec![primer("P1", b"GATTACA"), primer("P2", b"GATTAGA")];
        let read = b"AAAAAAGATTACATTTT";
        // P1 scores 0, P2 scores 1; both are under the ceiling but the
        // minimum is unique.
        assert_eq!(
            scan(&primers, read, &params(6, 0, 1)),
            ClipDecision::Accepted {
                boundary: 6,
                offset: 0,
                primer: 0,
                mismatches: 0,
            }
        );
    }

    #[test]
    fn identical_primers_are_ambiguous_regardless_of_order() {
        let read = b"AAAAAAGATTACATTTT";
        for ids in [["P1", "P2"], ["P2", "P1"]] {
            let primers = vec![primer(ids[0], b"GATTACA"), primer(ids[1], b"GATTACA")];
            assert_eq!(
                scan(&primers, read, &params(6, 0, 0)),
                ClipDecision::Rejected(RejectReason::AmbiguousMatch)
            );
        }
    }

    #[test]
    fn unrelated_read_is_no_primer_match() {
        let primers = vec![primer("P1", b"GATTACA")];
        assert_eq!(
            scan(&primers, b"AAAAAACCCCCCC", &params(6, 0, 1)),
            ClipDecision::Rejected(RejectReason::NoPrimerMatch)
        );
    }

    #[test]
    fn offsets_are_tried_in_ascending_order() {
        let primers = vec![primer("P1", b"GATTACA")];
        // The UMI/primer layout only lines up with two extra leading bases.
        let read = b"GGAAAAAAGATTACATT";
        assert_eq!(
            scan(&primers, read, &params(6, 2, 0)),
            ClipDecision::Accepted {
                boundary: 8,
                offset: 2,
                primer: 0,
                mismatches: 0,
            }
        );
    }

    #[test]
    fn ambiguity_is_terminal_even_when_a_later_offset_would_match() {
        let primers = vec![primer("P1", b"AC"), primer("P2", b"AG")];
        // Offset 0 window "AA" scores 1 against both primers; offset 1
        // window "AC" would match P1 exactly, but must never be reached.
        assert_eq!(
            scan(&primers, b"AACGG", &params(0, 1, 1)),
            ClipDecision::Rejected(RejectReason::AmbiguousMatch)
        );
    }

    #[test]
    fn short_read_is_read_too_short_at_every_offset() {
        let primers = vec![primer("P1", b"GATTACA")];
        assert_eq!(
            scan(&primers, b"ACGT", &params(6, 2, 1)),
            ClipDecision::Rejected(RejectReason::ReadTooShort)
        );
    }

    #[test]
    fn partial_window_coverage_is_not_too_short() {
        // The long primer never fits the read; the short one does but scores
        // over the ceiling. That is a failed match, not a short read.
        let primers = vec![primer("P1", b"CCCC"), primer("P2", b"GATTACAGATTACA")];
        assert_eq!(
            scan(&primers, b"AAAAAAGGGGG", &params(6, 0, 1)),
            ClipDecision::Rejected(RejectReason::NoPrimerMatch)
        );
    }

    #[test]
    fn different_length_primers_tie_is_still_ambiguous() {
        // Score equality alone triggers ambiguity, independent of how much
        // of the read each primer covered.
        let primers = vec![primer("P1", b"ACGT"), primer("P2", b"ACGTTTT")];
        assert_eq!(
            scan(&primers, b"ACGTTTTAA", &params(0, 0, 0)),
            ClipDecision::Rejected(RejectReason::AmbiguousMatch)
        );
    }

    #[test]
    fn umi_length_zero_expects_primer_at_read_start() {
        let primers = vec![primer("P1", b"GATTACA")];
        assert_eq!(
            scan(&primers, b"GATTACATTT", &params(0, 0, 0)),
            ClipDecision::Accepted {
                boundary: 0,
                offset: 0,
                primer: 0,
                mismatches: 0,
            }
        );
    }

    #[test]
    fn raising_the_ceiling_turns_no_match_into_accept() {
        let primers = vec![primer("P1", b"GATTACA")];
        let read = b"AAAAAAGAGGACATTTT"; // two mismatches against P1
        assert_eq!(
            scan(&primers, read, &params(6, 0, 1)),
            ClipDecision::Rejected(RejectReason::NoPrimerMatch)
        );
        assert_eq!(
            scan(&primers, read, &params(6, 0, 2)),
            ClipDecision::Accepted {
                boundary: 6,
                offset: 0,
                primer: 0,
                mismatches: 2,
            }
        );
    }

    #[test]
    fn scan_is_deterministic() {
        let primers = vec![primer("P1", b"GATTACA"), primer("P2", b"GATTAGA")];
        let read = b"AAAAAAGATTACATTTT";
        let p = params(6, 2, 1);
        assert_eq!(scan(&primers, read, &p), scan(&primers, read, &p));
    }
}
