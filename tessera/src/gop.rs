// Copyright (c) the Tessera Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::frame::{Frame, FrameMap};

/// One group of pictures: consecutive frames in file-name order, the
/// first of which becomes the group's reference during encoding.
pub type Group = Vec<(String, Frame)>;

/// Splits `frames` into consecutive non-overlapping groups of `gop`
/// frames. Order is preserved and the final group may be shorter.
pub fn partition(frames: FrameMap, gop: usize) -> Vec<Group> {
    debug_assert!(gop >= 1);
    let mut groups = Vec::with_capacity(frames.len().div_ceil(gop.max(1)));
    let mut current = Group::new();
    for entry in frames {
        current.push(entry);
        if current.len() == gop {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

#[cfg(test)]
mod test {
    use super::partition;
    use crate::frame::{Frame, FrameMap};

    fn frames(count: usize) -> FrameMap {
        (0..count)
            .map(|i| (format!("frame_{i:03}.jpeg"), Frame::new(4, 4, 1).unwrap()))
            .collect()
    }

    #[test]
    fn splits_with_short_tail() {
        let groups = partition(frames(5), 2);
        assert_eq!(groups.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        assert_eq!(groups[0][0].0, "frame_000.jpeg");
        assert_eq!(groups[2][0].0, "frame_004.jpeg");
    }

    #[test]
    fn one_group_when_gop_exceeds_input() {
        let groups = partition(frames(3), 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn preserves_global_order() {
        let names: Vec<String> = partition(frames(7), 3)
            .into_iter()
            .flatten()
            .map(|(name, _)| name)
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(partition(FrameMap::new(), 4).is_empty());
    }
}
