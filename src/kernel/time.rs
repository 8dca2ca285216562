/// Position inside a multi-file timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilePosition {
    pub index: usize,
    pub offset: f64,
}

/// Map an absolute timeline time onto (file index, in-file offset).
///
/// Times past the end clamp into the last file; negative times clamp to 0.
/// A boundary time belongs to the following file.
pub fn locate_in_files(time: f64, file_durations: &[f64]) -> FilePosition {
    let mut remaining = time.max(0.0);
    for (index, duration) in file_durations.iter().enumerate() {
        let duration = duration.max(0.0);
        let is_last = index + 1 == file_durations.len();
        if remaining < duration || is_last {
            return FilePosition {
                index,
                offset: if is_last { remaining.min(duration) } else { remaining },
            };
        }
        remaining -= duration;
    }
    FilePosition { index: 0, offset: 0.0 }
}

/// Absolute start time of file `index`.
pub fn file_start(index: usize, file_durations: &[f64]) -> f64 {
    file_durations.iter().take(index).map(|d| d.max(0.0)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_belongs_to_next_file() {
        let files = [10.0, 5.0, 8.0];
        assert_eq!(locate_in_files(10.0, &files), FilePosition { index: 1, offset: 0.0 });
        assert_eq!(locate_in_files(16.5, &files), FilePosition { index: 2, offset: 1.5 });
    }

    #[test]
    fn out_of_range_clamps() {
        let files = [10.0, 5.0];
        assert_eq!(locate_in_files(-3.0, &files), FilePosition { index: 0, offset: 0.0 });
        assert_eq!(locate_in_files(99.0, &files), FilePosition { index: 1, offset: 5.0 });
        assert_eq!(locate_in_files(1.0, &[]), FilePosition { index: 0, offset: 0.0 });
        assert_eq!(file_start(2, &files), 15.0);
    }
}
