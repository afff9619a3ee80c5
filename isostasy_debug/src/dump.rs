// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Indented text snapshots of an element subtree.
//!
//! Each line shows one element with its slot, a column of flag letters, its
//! desired size and its final rect:
//!
//! ```text
//! #0 [M·A····] desired=0.0x0.0 rect=(0.0,0.0 100.0x50.0)
//!   #1 [·P·····] desired=10.0x10.0 rect=(0.0,0.0 100.0x50.0)
//! ```
//!
//! | Letter | Meaning                              |
//! |--------|--------------------------------------|
//! | `M`    | measure dirty                        |
//! | `P`    | on a measure dirty path              |
//! | `A`    | arrange dirty                        |
//! | `a`    | on an arrange dirty path             |
//! | `p`    | has a pending invalidation           |
//! | `V`    | viewport dirty or on a viewport path |
//! | `C`    | collapsed                            |
//!
//! A `·` stands for a clear flag.

use std::io::{self, Write};

use isostasy_core::element::{ElementId, ElementTree, Visibility};
use isostasy_core::flags::LayoutFlags;

/// Writes `root` and its descendants to `out`, two spaces of indent per level.
pub fn dump_tree(tree: &ElementTree, root: ElementId, out: &mut dyn Write) -> io::Result<()> {
    dump_element(tree, root, 0, out)
}

/// Renders the subtree into a `String`.
#[must_use]
pub fn dump_to_string(tree: &ElementTree, root: ElementId) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = dump_tree(tree, root, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// The flag column for one element.
#[must_use]
pub fn flag_letters(flags: LayoutFlags, visibility: Visibility) -> String {
    let letter = |on: bool, c: char| if on { c } else { '·' };
    [
        letter(flags.contains(LayoutFlags::MEASURE_DIRTY), 'M'),
        letter(flags.contains(LayoutFlags::ON_MEASURE_DIRTY_PATH), 'P'),
        letter(flags.contains(LayoutFlags::ARRANGE_DIRTY), 'A'),
        letter(flags.contains(LayoutFlags::ON_ARRANGE_DIRTY_PATH), 'a'),
        letter(flags.has_pending(), 'p'),
        letter(flags.requires_viewport_walk(), 'V'),
        letter(visibility == Visibility::Collapsed, 'C'),
    ]
    .into_iter()
    .collect()
}

fn dump_element(tree: &ElementTree, id: ElementId, depth: usize, out: &mut dyn Write) -> io::Result<()> {
    let desired = tree.desired_size(id);
    let rect = tree.final_rect(id);
    writeln!(
        out,
        "{:indent$}#{} [{}] desired={:.1}x{:.1} rect=({:.1},{:.1} {:.1}x{:.1})",
        "",
        id.index(),
        flag_letters(tree.layout_flags(id), tree.visibility(id)),
        desired.width,
        desired.height,
        rect.x0,
        rect.y0,
        rect.width(),
        rect.height(),
        indent = depth * 2,
    )?;
    for child in tree.children(id) {
        dump_element(tree, child, depth + 1, out)?;
    }
    Ok(())
}
