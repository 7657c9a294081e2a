//! Layout engine.
//!
//! Members are walked in declaration order. Fixed-width members seen before
//! any variable-length member get a static offset from the structure base.
//! The first variable-length member, and everything after it, is placed
//! relative to the runtime limit of the nearest preceding variable-length
//! member (the anchor) plus the static bytes accumulated since.

use serde::Serialize;

use crate::encoding::Encoding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// The structure's own start offset.
    Base,
    /// The wire limit of the member at this index.
    Member(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Static(usize),
    Anchored { anchor: Anchor, delta: usize },
}

impl Placement {
    /// Resolves to an absolute offset. `limit_of` yields the runtime limit of
    /// an anchor member.
    pub fn offset<E>(
        &self,
        base: usize,
        limit_of: impl FnOnce(usize) -> Result<usize, E>,
    ) -> Result<usize, E> {
        match *self {
            Placement::Static(offset) => Ok(base + offset),
            Placement::Anchored {
                anchor: Anchor::Base,
                delta,
            } => Ok(base + delta),
            Placement::Anchored {
                anchor: Anchor::Member(index),
                delta,
            } => Ok(limit_of(index)? + delta),
        }
    }

    pub fn anchor(&self) -> Option<usize> {
        match self {
            Placement::Anchored {
                anchor: Anchor::Member(index),
                ..
            } => Some(*index),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
    pub placements: Vec<Placement>,
    /// Where the structure ends.
    pub end:        Placement,
    /// Total size when every member is fixed width.
    pub fixed_size: Option<usize>,
}

pub fn layout_members(encodings: &[Encoding]) -> Layout {
    let mut placements = Vec::with_capacity(encodings.len());
    let mut accum = 0;
    let mut anchor: Option<usize> = None;

    for (index, encoding) in encodings.iter().enumerate() {
        match (encoding.fixed_width(), anchor) {
            (Some(width), None) => {
                placements.push(Placement::Static(accum));
                accum += width;
            }
            (Some(width), Some(current)) => {
                placements.push(Placement::Anchored {
                    anchor: Anchor::Member(current),
                    delta:  accum,
                });
                accum += width;
            }
            (None, current) => {
                placements.push(Placement::Anchored {
                    anchor: current.map_or(Anchor::Base, Anchor::Member),
                    delta:  accum,
                });
                accum = 0;
                anchor = Some(index);
            }
        }
    }

    match anchor {
        None => Layout {
            placements,
            end: Placement::Static(accum),
            fixed_size: Some(accum),
        },
        Some(current) => Layout {
            placements,
            end: Placement::Anchored {
                anchor: Anchor::Member(current),
                delta:  accum,
            },
            fixed_size: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brine_wire_schema::ByteOrder;

    fn int(bits: u8) -> Encoding {
        Encoding::Int {
            bits,
            signed: true,
            order: ByteOrder::Native,
        }
    }

    fn string() -> Encoding {
        Encoding::String {
            prefix_bits: 8,
            order:       ByteOrder::Native,
        }
    }

    #[test]
    fn fixed_struct_size_is_sum_of_widths() {
        let layout = layout_members(&[int(8), int(16), int(24), int(64), Encoding::FixedOctets { length: 5 }]);
        assert_eq!(
            layout.placements,
            vec![
                Placement::Static(0),
                Placement::Static(1),
                Placement::Static(3),
                Placement::Static(6),
                Placement::Static(14),
            ]
        );
        assert_eq!(layout.fixed_size, Some(19));
        assert_eq!(layout.end, Placement::Static(19));
    }

    #[test]
    fn variable_members_become_anchors() {
        let layout = layout_members(&[int(32), string(), int(8), int(16), string(), int(8)]);
        assert_eq!(
            layout.placements,
            vec![
                Placement::Static(0),
                Placement::Anchored {
                    anchor: Anchor::Base,
                    delta:  4,
                },
                Placement::Anchored {
                    anchor: Anchor::Member(1),
                    delta:  0,
                },
                Placement::Anchored {
                    anchor: Anchor::Member(1),
                    delta:  1,
                },
                Placement::Anchored {
                    anchor: Anchor::Member(1),
                    delta:  3,
                },
                Placement::Anchored {
                    anchor: Anchor::Member(4),
                    delta:  0,
                },
            ]
        );
        assert_eq!(
            layout.end,
            Placement::Anchored {
                anchor: Anchor::Member(4),
                delta:  1,
            }
        );
        assert_eq!(layout.fixed_size, None);
    }

    #[test]
    fn empty_layout() {
        let layout = layout_members(&[]);
        assert_eq!(layout.fixed_size, Some(0));
        assert_eq!(layout.end, Placement::Static(0));
    }

    #[test]
    fn placement_offsets() {
        let limits = [0usize, 40];
        let anchored = Placement::Anchored {
            anchor: Anchor::Member(1),
            delta:  2,
        };
        assert_eq!(anchored.offset::<()>(10, |i| Ok(limits[i])), Ok(42));
        assert_eq!(Placement::Static(3).offset::<()>(10, |_| Err(())), Ok(13));
        assert_eq!(anchored.anchor(), Some(1));
    }
}
