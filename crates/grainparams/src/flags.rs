use std::fmt;

use thiserror::Error;

use crate::GrainParams;

#[derive(Debug, Error, PartialEq)]
pub enum FlagError {
    #[error("help requested")]
    HelpRequested,

    #[error("unknown flag '{0}'")]
    Unknown(String),

    #[error("{flag} expects {expected} value(s), got {found}")]
    MissingValues {
        flag: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{flag}: '{value}' is not a valid {kind}")]
    InvalidValue {
        flag: &'static str,
        value: String,
        kind: ValueKind,
    },

    #[error("{flag}: {value} is out of range ({expected})")]
    OutOfRange {
        flag: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
}

impl ValueKind {
    fn parse(self, raw: &str) -> Option<FlagValue> {
        let trimmed = raw.trim();
        match self {
            ValueKind::Int => trimmed.parse::<i32>().ok().map(FlagValue::Int),
            ValueKind::Float => trimmed
                .parse::<f32>()
                .ok()
                .filter(|value| value.is_finite())
                .map(FlagValue::Float),
        }
    }

    fn placeholder(self) -> &'static str {
        match self {
            ValueKind::Int => "<int>",
            ValueKind::Float => "<float>",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Int => f.write_str("integer"),
            ValueKind::Float => f.write_str("number"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlagValue {
    Int(i32),
    Float(f32),
}

impl FlagValue {
    fn int(self) -> i32 {
        match self {
            FlagValue::Int(value) => value,
            FlagValue::Float(value) => value as i32,
        }
    }

    fn float(self) -> f32 {
        match self {
            FlagValue::Int(value) => value as f32,
            FlagValue::Float(value) => value,
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Int(value) => write!(f, "{value}"),
            FlagValue::Float(value) => write!(f, "{value:?}"),
        }
    }
}

/// One row of the flag table: the flag consumes exactly `arity` tokens of
/// `kind` and hands them to `apply`.
pub struct FlagSpec {
    pub name: &'static str,
    pub kind: ValueKind,
    pub arity: usize,
    pub description: &'static str,
    apply: fn(&mut GrainParams, &[FlagValue]) -> Result<(), FlagError>,
    current: fn(&GrainParams) -> Vec<FlagValue>,
}

impl FlagSpec {
    pub fn current_values(&self, params: &GrainParams) -> Vec<FlagValue> {
        (self.current)(params)
    }
}

impl fmt::Debug for FlagSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("arity", &self.arity)
            .finish()
    }
}

fn ints<const N: usize>(values: &[FlagValue]) -> [i32; N] {
    std::array::from_fn(|index| values[index].int())
}

fn floats<const N: usize>(values: &[FlagValue]) -> [f32; N] {
    std::array::from_fn(|index| values[index].float())
}

pub static FLAGS: &[FlagSpec] = &[
    FlagSpec {
        name: "-noise_tile_size",
        kind: ValueKind::Int,
        arity: 1,
        description: "noise sampling tile granularity in pixels",
        apply: |params, values| {
            let size = values[0].int();
            if size < 1 {
                return Err(FlagError::OutOfRange {
                    flag: "-noise_tile_size",
                    value: size.to_string(),
                    expected: "must be at least 1",
                });
            }
            params.noise_tile_size = size;
            Ok(())
        },
        current: |params| vec![FlagValue::Int(params.noise_tile_size)],
    },
    FlagSpec {
        name: "-noise_offsets_r",
        kind: ValueKind::Int,
        arity: 2,
        description: "red channel noise texture offset (x y)",
        apply: |params, values| {
            params.noise_offsets_r = ints(values);
            Ok(())
        },
        current: |params| params.noise_offsets_r.map(FlagValue::Int).to_vec(),
    },
    FlagSpec {
        name: "-noise_offsets_g",
        kind: ValueKind::Int,
        arity: 2,
        description: "green channel noise texture offset (x y)",
        apply: |params, values| {
            params.noise_offsets_g = ints(values);
            Ok(())
        },
        current: |params| params.noise_offsets_g.map(FlagValue::Int).to_vec(),
    },
    FlagSpec {
        name: "-noise_offsets_b",
        kind: ValueKind::Int,
        arity: 2,
        description: "blue channel noise texture offset (x y)",
        apply: |params, values| {
            params.noise_offsets_b = ints(values);
            Ok(())
        },
        current: |params| params.noise_offsets_b.map(FlagValue::Int).to_vec(),
    },
    FlagSpec {
        name: "-layer_weights",
        kind: ValueKind::Float,
        arity: 4,
        description: "intensity multiplier for each of the four grain layers",
        apply: |params, values| {
            params.layer_weights = floats(values);
            Ok(())
        },
        current: |params| params.layer_weights.map(FlagValue::Float).to_vec(),
    },
    FlagSpec {
        name: "-grayscale",
        kind: ValueKind::Int,
        arity: 1,
        description: "treat the image as luminance only (0 or 1)",
        apply: |params, values| match values[0].int() {
            0 => {
                params.grayscale = false;
                Ok(())
            }
            1 => {
                params.grayscale = true;
                Ok(())
            }
            other => Err(FlagError::OutOfRange {
                flag: "-grayscale",
                value: other.to_string(),
                expected: "expected 0 or 1",
            }),
        },
        current: |params| vec![FlagValue::Int(i32::from(params.grayscale))],
    },
    FlagSpec {
        name: "-base_color",
        kind: ValueKind::Float,
        arity: 3,
        description: "RGB black point of the film base",
        apply: |params, values| {
            params.base_color = floats(values);
            Ok(())
        },
        current: |params| params.base_color.map(FlagValue::Float).to_vec(),
    },
    FlagSpec {
        name: "-use_base_color",
        kind: ValueKind::Float,
        arity: 1,
        description: "blend factor toward the base color (0.0 - 1.0)",
        apply: |params, values| {
            let blend = values[0].float();
            if !(0.0..=1.0).contains(&blend) {
                return Err(FlagError::OutOfRange {
                    flag: "-use_base_color",
                    value: blend.to_string(),
                    expected: "expected 0.0 - 1.0",
                });
            }
            params.use_base_color = blend;
            Ok(())
        },
        current: |params| vec![FlagValue::Float(params.use_base_color)],
    },
];

fn lookup(name: &str) -> Option<&'static FlagSpec> {
    FLAGS.iter().find(|spec| spec.name == name)
}

fn is_help(token: &str) -> bool {
    matches!(token, "-h" | "-help" | "--help")
}

/// Applies `args` on top of `params`, consuming each flag's values in order.
///
/// Later occurrences of a flag overwrite earlier ones. `params` may be
/// partially updated when an error is returned.
pub fn parse_flags<S: AsRef<str>>(params: &mut GrainParams, args: &[S]) -> Result<(), FlagError> {
    let mut tokens = args.iter().map(AsRef::as_ref);
    while let Some(token) = tokens.next() {
        if is_help(token) {
            return Err(FlagError::HelpRequested);
        }
        let spec = lookup(token).ok_or_else(|| FlagError::Unknown(token.to_string()))?;

        let mut values = Vec::with_capacity(spec.arity);
        while values.len() < spec.arity {
            let missing = FlagError::MissingValues {
                flag: spec.name,
                expected: spec.arity,
                found: values.len(),
            };
            let Some(raw) = tokens.next() else {
                return Err(missing);
            };
            if lookup(raw).is_some() || is_help(raw) {
                return Err(missing);
            }
            let value = spec.kind.parse(raw).ok_or_else(|| FlagError::InvalidValue {
                flag: spec.name,
                value: raw.to_string(),
                kind: spec.kind,
            })?;
            values.push(value);
        }

        (spec.apply)(params, &values)?;
    }
    Ok(())
}

/// Renders the flag table with the values currently held in `params`.
pub fn describe_flags(params: &GrainParams) -> String {
    let mut out = String::new();
    for spec in FLAGS {
        let placeholders = vec![spec.kind.placeholder(); spec.arity].join(" ");
        let current = spec
            .current_values(params)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!(
            "  {:<17} {:<31} {} [current: {}]\n",
            spec.name, placeholders, spec.description, current
        ));
    }
    out
}
