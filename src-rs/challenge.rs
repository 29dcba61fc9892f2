//! Challenge classification: target-class table and variant sniffing.
//!
//! The widget describes each challenge in prose, so classification is text
//! matching against a fixed term table. Unmatched text is never an error:
//! it yields the "unrecognized" sentinel and the engine asks for a fresh
//! challenge instead.

/// Object classes the detector was trained on, keyed by instruction term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetClass {
    Bicycle,
    Car,
    Motorcycle,
    Bus,
    Boat,
    TrafficLight,
    Hydrant,
}

/// Term table in match order; earlier entries win on overlapping text.
const TERMS: [(&str, TargetClass); 7] = [
    ("bicycle", TargetClass::Bicycle),
    ("bus", TargetClass::Bus),
    ("boat", TargetClass::Boat),
    ("car", TargetClass::Car),
    ("hydrant", TargetClass::Hydrant),
    ("motorcycle", TargetClass::Motorcycle),
    ("traffic", TargetClass::TrafficLight),
];

impl TargetClass {
    /// Detector class id agreed with the model's label set.
    pub const fn class_id(self) -> u32 {
        match self {
            TargetClass::Bicycle => 1,
            TargetClass::Car => 2,
            TargetClass::Motorcycle => 3,
            TargetClass::Bus => 5,
            TargetClass::Boat => 8,
            TargetClass::TrafficLight => 9,
            TargetClass::Hydrant => 10,
        }
    }

    /// Instruction term this class is matched by.
    pub const fn term(self) -> &'static str {
        match self {
            TargetClass::Bicycle => "bicycle",
            TargetClass::Car => "car",
            TargetClass::Motorcycle => "motorcycle",
            TargetClass::Bus => "bus",
            TargetClass::Boat => "boat",
            TargetClass::TrafficLight => "traffic",
            TargetClass::Hydrant => "hydrant",
        }
    }

    /// Matches the emphasized instruction text against the term table.
    /// Returns `None` when no known term appears (the unrecognized sentinel).
    pub fn from_instruction(text: &str) -> Option<TargetClass> {
        let haystack = text.to_ascii_lowercase();
        TERMS
            .iter()
            .find(|(term, _)| haystack.contains(term))
            .map(|&(_, class)| class)
    }
}

/// Which of the three challenge flavors is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Static 3x3 grid, one click pass.
    Selection,
    /// 3x3 grid whose selected tiles regenerate after each click pass.
    Dynamic,
    /// 4x4 grid over one image with objects spanning multiple cells.
    Squares,
}

impl Variant {
    pub const fn grid_size(self) -> u32 {
        match self {
            Variant::Selection | Variant::Dynamic => 3,
            Variant::Squares => 4,
        }
    }

    /// Edge length of the square challenge image, in pixels.
    pub const fn canvas_size(self) -> u32 {
        match self {
            Variant::Selection | Variant::Dynamic => 300,
            Variant::Squares => 450,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Variant::Selection => "selection",
            Variant::Dynamic => "dynamic",
            Variant::Squares => "squares",
        }
    }
}

/// One classified challenge instance. Immutable until a reload discards it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge {
    pub target: TargetClass,
    pub variant: Variant,
}

impl Challenge {
    pub const fn grid_size(&self) -> u32 {
        self.variant.grid_size()
    }
}

/// Classifies the instruction text.
///
/// `instruction` is the emphasized object phrase; `banner` is the full prose
/// of the challenge header, which carries the variant hints: "squares" marks
/// the 4x4 overlap challenge and "none" marks the regenerating 3x3 grid
/// ("click verify once there are none left"). Anything else is the static
/// selection grid. Text sniffing is inherently fragile, so unmatched text
/// degrades to `(None, ...)` rather than failing.
pub fn classify_instruction(instruction: &str, banner: &str) -> (Option<TargetClass>, Variant) {
    let target = TargetClass::from_instruction(instruction);
    let banner = banner.to_ascii_lowercase();
    let variant = if banner.contains("squares") {
        Variant::Squares
    } else if banner.contains("none") {
        Variant::Dynamic
    } else {
        Variant::Selection
    };
    (target, variant)
}
