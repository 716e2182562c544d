use crate::parser::ID_RE;

/// Splices a remote id marker into (or out of) one row's source lines.
///
/// Rows own non-overlapping line ranges, so mutating only the tail of a
/// row's own lines keeps every other row's content contiguous and in order;
/// absolute document offsets are re-derived at serialization time instead of
/// being captured up front.
///
/// Block rows carry the marker as a dedicated `^id` line directly after the
/// last content line; inline rows carry ` ^id` on the card line itself. An
/// existing marker (either the caret or the `<!--ID: n-->` comment form) is
/// substituted in place.
pub fn write_id(lines: &[String], id: Option<u64>, inline: bool) -> Vec<String> {
    let mut out = lines.to_vec();
    let Some(last) = out.pop() else {
        return out;
    };

    if ID_RE.is_match(&last) {
        match id {
            Some(id) => out.push(ID_RE.replace(&last, format!("^{}", id).as_str()).into_owned()),
            None => {
                let stripped = ID_RE.replace(&last, "").into_owned();
                if inline {
                    out.push(format!("{}\n", stripped.trim_end()));
                } else if !stripped.trim().is_empty() {
                    // marker shared a line with other content; keep the rest
                    out.push(stripped);
                }
                // a marker-only line is dropped entirely
            }
        }
        return out;
    }

    match id {
        Some(id) if inline => out.push(format!("{} ^{}\n", last.trim_end(), id)),
        Some(id) => {
            out.push(last);
            out.push(format!("^{}\n", id));
        }
        // nothing to remove
        None => out.push(last),
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn block_insert_adds_exactly_one_line() {
        let original = lines(&[">[!question] Q #card\n", ">A\n"]);
        let updated = write_id(&original, Some(123), false);

        assert_eq!(updated.len(), original.len() + 1);
        assert_eq!(&updated[..original.len()], &original[..]);
        assert_eq!(updated.last().unwrap(), "^123\n");
    }

    #[test]
    fn block_remove_deletes_exactly_the_marker_line() {
        let original = lines(&[">[!question] Q #card\n", ">A\n", "^123\n"]);
        let updated = write_id(&original, None, false);
        assert_eq!(updated, lines(&[">[!question] Q #card\n", ">A\n"]));
    }

    #[test]
    fn block_marker_is_substituted_in_place() {
        let original = lines(&[">[!question] Q #card\n", ">A\n", "^123\n"]);
        let updated = write_id(&original, Some(456), false);
        assert_eq!(updated.last().unwrap(), "^456\n");
        assert_eq!(updated.len(), original.len());

        let comment = lines(&[">[!question] Q #card\n", ">A\n", "<!--ID: 123-->\n"]);
        let updated = write_id(&comment, Some(456), false);
        assert_eq!(updated.last().unwrap(), "^456\n");
    }

    #[test]
    fn inline_markers_stay_on_the_card_line() {
        let original = lines(&["Front::Back\n"]);
        let inserted = write_id(&original, Some(55), true);
        assert_eq!(inserted, lines(&["Front::Back ^55\n"]));

        let replaced = write_id(&inserted, Some(77), true);
        assert_eq!(replaced, lines(&["Front::Back ^77\n"]));

        let removed = write_id(&inserted, None, true);
        assert_eq!(removed, lines(&["Front::Back\n"]));
    }

    #[test]
    fn insertions_shift_later_rows_cumulatively() {
        // three rows, each two lines long, separated by blank-line rows
        let mut rows = vec![
            lines(&[">[!question] Q1 #card\n", ">A1\n"]),
            lines(&["\n"]),
            lines(&[">[!question] Q2 #card\n", ">A2\n"]),
            lines(&["\n"]),
            lines(&[">[!question] Q3 #card\n", ">A3\n"]),
        ];

        // original absolute offsets of the line each marker lands after
        let original_offsets = [2, 5, 8];

        for row in [0, 2, 4] {
            rows[row] = write_id(&rows[row], Some(100 + row as u64), false);
        }

        let flat: Vec<&String> = rows.iter().flatten().collect();
        let marker_positions: Vec<usize> = flat
            .iter()
            .enumerate()
            .filter(|(_, line)| line.starts_with('^'))
            .map(|(i, _)| i)
            .collect();

        let expected: Vec<usize> =
            original_offsets.iter().enumerate().map(|(i, offset)| offset + i).collect();
        assert_eq!(marker_positions, expected);
    }
}
