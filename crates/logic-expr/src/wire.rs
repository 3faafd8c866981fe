//! Binary (de)serialization for predicate trees, mirroring the tag-prefixed
//! convention `logic_core::Value` uses (spec §6, catalogue persistence:
//! "variant-tag, body").

use std::io::{self, Read, Write};

use crate::formula::Formula;
use crate::predicate::{Combiner, Comparison, Literal, Operand, Predicate};
use logic_core::ValueType;

#[derive(Debug, Clone, thiserror::Error)]
pub enum WireError {
    #[error("malformed predicate stream: {0}")]
    Malformed(String),

    #[error("stored formula no longer parses: {0}")]
    FormulaReparse(#[from] crate::error::ParseError),
}

fn value_type_tag(vt: ValueType) -> u8 {
    match vt {
        ValueType::Bool => 0,
        ValueType::U32 => 1,
        ValueType::I32 => 2,
        ValueType::F64 => 3,
        ValueType::String => 4,
        ValueType::StringList => 5,
        ValueType::Instant => 6,
    }
}

fn value_type_from_tag(tag: u8) -> Result<ValueType, WireError> {
    Ok(match tag {
        0 => ValueType::Bool,
        1 => ValueType::U32,
        2 => ValueType::I32,
        3 => ValueType::F64,
        4 => ValueType::String,
        5 => ValueType::StringList,
        6 => ValueType::Instant,
        tag => return Err(WireError::Malformed(format!("unknown value type tag {tag}"))),
    })
}

fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    w.write_all(&(bytes.len() as u32).to_le_bytes())?;
    w.write_all(bytes)
}

fn read_str<R: Read>(r: &mut R) -> Result<String, WireError> {
    let len = read_u32(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(|e| WireError::Malformed(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| WireError::Malformed(e.to_string()))
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8, WireError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(|e| WireError::Malformed(e.to_string()))?;
    Ok(buf[0])
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, WireError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| WireError::Malformed(e.to_string()))?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i64<R: Read>(r: &mut R) -> Result<i64, WireError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| WireError::Malformed(e.to_string()))?;
    Ok(i64::from_le_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R) -> Result<f64, WireError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| WireError::Malformed(e.to_string()))?;
    Ok(f64::from_le_bytes(buf))
}

impl Literal {
    pub fn stream_out<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Literal::Bool(v) => {
                w.write_all(&[0])?;
                w.write_all(&[*v as u8])
            }
            Literal::Int(v) => {
                w.write_all(&[1])?;
                w.write_all(&v.to_le_bytes())
            }
            Literal::Float(v) => {
                w.write_all(&[2])?;
                w.write_all(&v.to_le_bytes())
            }
            Literal::Str(v) => {
                w.write_all(&[3])?;
                write_str(w, v)
            }
        }
    }

    pub fn stream_in<R: Read>(r: &mut R) -> Result<Self, WireError> {
        Ok(match read_u8(r)? {
            0 => Literal::Bool(read_u8(r)? != 0),
            1 => Literal::Int(read_i64(r)?),
            2 => Literal::Float(read_f64(r)?),
            3 => Literal::Str(read_str(r)?),
            tag => return Err(WireError::Malformed(format!("unknown literal tag {tag}"))),
        })
    }
}

impl Operand {
    pub fn stream_out<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Operand::Literal(lit) => {
                w.write_all(&[0])?;
                lit.stream_out(w)
            }
            Operand::FieldRef(idx) => {
                w.write_all(&[1])?;
                w.write_all(&(*idx as u32).to_le_bytes())
            }
        }
    }

    pub fn stream_in<R: Read>(r: &mut R) -> Result<Self, WireError> {
        Ok(match read_u8(r)? {
            0 => Operand::Literal(Literal::stream_in(r)?),
            1 => Operand::FieldRef(read_u32(r)? as usize),
            tag => return Err(WireError::Malformed(format!("unknown operand tag {tag}"))),
        })
    }
}

impl Comparison {
    pub fn stream_out<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Comparison::Equal(op) => {
                w.write_all(&[0])?;
                op.stream_out(w)
            }
            Comparison::NotEqual(op) => {
                w.write_all(&[1])?;
                op.stream_out(w)
            }
            Comparison::Less(op) => {
                w.write_all(&[2])?;
                op.stream_out(w)
            }
            Comparison::Greater(op) => {
                w.write_all(&[3])?;
                op.stream_out(w)
            }
            Comparison::LessOrEqual(op) => {
                w.write_all(&[4])?;
                op.stream_out(w)
            }
            Comparison::GreaterOrEqual(op) => {
                w.write_all(&[5])?;
                op.stream_out(w)
            }
            Comparison::MatchesRegex(pattern) => {
                w.write_all(&[6])?;
                write_str(w, pattern)
            }
            Comparison::WithinRange(low, high) => {
                w.write_all(&[7])?;
                low.stream_out(w)?;
                high.stream_out(w)
            }
        }
    }

    pub fn stream_in<R: Read>(r: &mut R) -> Result<Self, WireError> {
        Ok(match read_u8(r)? {
            0 => Comparison::Equal(Operand::stream_in(r)?),
            1 => Comparison::NotEqual(Operand::stream_in(r)?),
            2 => Comparison::Less(Operand::stream_in(r)?),
            3 => Comparison::Greater(Operand::stream_in(r)?),
            4 => Comparison::LessOrEqual(Operand::stream_in(r)?),
            5 => Comparison::GreaterOrEqual(Operand::stream_in(r)?),
            6 => Comparison::MatchesRegex(read_str(r)?),
            7 => Comparison::WithinRange(Operand::stream_in(r)?, Operand::stream_in(r)?),
            tag => return Err(WireError::Malformed(format!("unknown comparison tag {tag}"))),
        })
    }
}

impl Predicate {
    pub fn stream_out<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.comparison.stream_out(w)?;
        w.write_all(&[self.negate as u8])
    }

    pub fn stream_in<R: Read>(r: &mut R) -> Result<Self, WireError> {
        let comparison = Comparison::stream_in(r)?;
        let negate = read_u8(r)? != 0;
        Ok(Predicate { comparison, negate })
    }
}

impl Combiner {
    pub fn stream_out<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let tag: u8 = match self {
            Combiner::And => 0,
            Combiner::Or => 1,
            Combiner::Xor => 2,
            Combiner::Nand => 3,
            Combiner::Nor => 4,
            Combiner::Xnor => 5,
        };
        w.write_all(&[tag])
    }

    pub fn stream_in<R: Read>(r: &mut R) -> Result<Self, WireError> {
        Ok(match read_u8(r)? {
            0 => Combiner::And,
            1 => Combiner::Or,
            2 => Combiner::Xor,
            3 => Combiner::Nand,
            4 => Combiner::Nor,
            5 => Combiner::Xnor,
            tag => return Err(WireError::Malformed(format!("unknown combiner tag {tag}"))),
        })
    }
}

impl Formula {
    /// Persists `source_text` and `result_type` only; the AST is rebuilt
    /// by re-parsing on [`Formula::stream_in`] rather than serialized
    /// directly (spec §3: "a compiled AST root (rebuilt on change)").
    pub fn stream_out<W: Write>(&self, result_type: ValueType, w: &mut W) -> io::Result<()> {
        w.write_all(&[value_type_tag(result_type)])?;
        write_str(w, self.source_text())
    }

    pub fn stream_in<R: Read>(r: &mut R) -> Result<(Formula, ValueType), WireError> {
        let result_type = value_type_from_tag(read_u8(r)?)?;
        let source_text = read_str(r)?;
        let formula = Formula::parse(&source_text)?;
        Ok((formula, result_type))
    }
}
