use super::Plan;
use crate::encoding::{bincode, json};
use crate::errinput;
use crate::error::Result;

/// A plan encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanFormat {
    /// Compact binary encoding.
    Binary,
    /// Textual JSON encoding.
    Json,
}

impl std::fmt::Display for PlanFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Binary => "binary",
            Self::Json => "json",
        })
    }
}

impl std::str::FromStr for PlanFormat {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "binary" => Ok(Self::Binary),
            "json" => Ok(Self::Json),
            s => errinput!("unknown plan format {s}"),
        }
    }
}

/// An encoded plan, as passed between producers and consumers.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanPayload {
    Binary(Vec<u8>),
    Json(String),
}

impl PlanPayload {
    /// Encodes a plan in the given format.
    pub fn encode(plan: &Plan, format: PlanFormat) -> Result<Self> {
        Ok(match format {
            PlanFormat::Binary => Self::Binary(bincode::serialize(plan)?),
            PlanFormat::Json => Self::Json(json::serialize(plan)?),
        })
    }

    /// Decodes the payload into a plan, checking its version.
    pub fn decode(&self) -> Result<Plan> {
        let plan: Plan = match self {
            Self::Binary(bytes) => bincode::deserialize(bytes)?,
            Self::Json(text) => json::deserialize(text)?,
        };
        plan.version.check()?;
        Ok(plan)
    }

    /// Returns the payload's format.
    pub fn format(&self) -> PlanFormat {
        match self {
            Self::Binary(_) => PlanFormat::Binary,
            Self::Json(_) => PlanFormat::Json,
        }
    }

    /// Re-encodes the payload in the given format, if necessary.
    pub fn convert(self, format: PlanFormat) -> Result<Self> {
        if self.format() == format {
            return Ok(self);
        }
        Self::encode(&self.decode()?, format)
    }

    /// Decodes the payload into a generic JSON message, without interpreting
    /// it as a plan. Binary payloads must still be decoded via the plan
    /// schema, since the binary encoding isn't self-describing.
    pub fn to_message(&self) -> Result<serde_json::Value> {
        match self {
            Self::Binary(bytes) => json::to_message(&bincode::deserialize::<Plan>(bytes)?),
            Self::Json(text) => json::deserialize(text),
        }
    }

    /// Returns the encoded size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Binary(bytes) => bytes.len(),
            Self::Json(text) => text.len(),
        }
    }

    /// Returns true if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Literal, Rel, RelRoot, Version};

    fn plan() -> Plan {
        Plan {
            version: Version::current("test"),
            extensions: vec![],
            root: RelRoot {
                input: Rel::Values {
                    width: 2,
                    rows: vec![vec![Literal::Integer(1), Literal::String("x".into())]],
                },
                names: vec!["a".into(), "b".into()],
            },
        }
    }

    #[test]
    fn encodings_decode_to_same_plan() -> Result<()> {
        let binary = PlanPayload::encode(&plan(), PlanFormat::Binary)?;
        let json = PlanPayload::encode(&plan(), PlanFormat::Json)?;
        assert_eq!(binary.decode()?, plan());
        assert_eq!(json.decode()?, plan());
        assert_eq!(binary.clone().convert(PlanFormat::Json)?, json);
        assert_eq!(binary.to_message()?, json.to_message()?);
        assert!(binary.len() < json.len());
        Ok(())
    }

    #[test]
    fn rejects_other_major_version() -> Result<()> {
        let mut plan = plan();
        plan.version.major += 1;
        let payload = PlanPayload::encode(&plan, PlanFormat::Json)?;
        assert!(payload.decode().is_err());
        Ok(())
    }

    #[test]
    fn rejects_garbage() {
        assert!(PlanPayload::Binary(vec![0xff, 0xff, 0xff]).decode().is_err());
        assert!(PlanPayload::Json("{".into()).decode().is_err());
    }

    #[test]
    fn parses_formats() -> Result<()> {
        assert_eq!("binary".parse::<PlanFormat>()?, PlanFormat::Binary);
        assert!("xml".parse::<PlanFormat>().is_err());
        Ok(())
    }
}
