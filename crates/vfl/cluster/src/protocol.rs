//! Protocol vocabulary for the secure unit and for matching

use std::fmt;
use std::str::FromStr;
use vfl_types::{ClusterInitError, UnitError};

/// Secret-sharing protocol run by the secure unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecureProtocol {
    Ref2k,
    Semi2k,
    Aby3,
    Cheetah,
}

impl FromStr for SecureProtocol {
    type Err = ClusterInitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "REF2K" => Ok(SecureProtocol::Ref2k),
            "SEMI2K" => Ok(SecureProtocol::Semi2k),
            "ABY3" => Ok(SecureProtocol::Aby3),
            "CHEETAH" => Ok(SecureProtocol::Cheetah),
            _ => Err(ClusterInitError::UnknownProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for SecureProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SecureProtocol::Ref2k => "REF2K",
            SecureProtocol::Semi2k => "SEMI2K",
            SecureProtocol::Aby3 => "ABY3",
            SecureProtocol::Cheetah => "CHEETAH",
        };
        f.write_str(s)
    }
}

/// Ring size used for secret shares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Fm32,
    Fm64,
    Fm128,
}

impl FieldType {
    pub fn bits(&self) -> u32 {
        match self {
            FieldType::Fm32 => 32,
            FieldType::Fm64 => 64,
            FieldType::Fm128 => 128,
        }
    }
}

impl FromStr for FieldType {
    type Err = ClusterInitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FM32" => Ok(FieldType::Fm32),
            "FM64" => Ok(FieldType::Fm64),
            "FM128" => Ok(FieldType::Fm128),
            _ => Err(ClusterInitError::UnknownField(s.to_string())),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FM{}", self.bits())
    }
}

/// Two-party private set intersection protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PsiProtocol {
    Ecdh,
    Kkrt,
    Bc22,
}

impl FromStr for PsiProtocol {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ECDH_PSI_2PC" => Ok(PsiProtocol::Ecdh),
            "KKRT_PSI_2PC" => Ok(PsiProtocol::Kkrt),
            "BC22_PSI_2PC" => Ok(PsiProtocol::Bc22),
            _ => Err(UnitError::Invalid(format!("unknown PSI protocol '{}'", s))),
        }
    }
}

impl fmt::Display for PsiProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PsiProtocol::Ecdh => "ECDH_PSI_2PC",
            PsiProtocol::Kkrt => "KKRT_PSI_2PC",
            PsiProtocol::Bc22 => "BC22_PSI_2PC",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parsing_is_case_insensitive() {
        assert_eq!("semi2k".parse::<SecureProtocol>().unwrap(), SecureProtocol::Semi2k);
        assert_eq!("Cheetah".parse::<SecureProtocol>().unwrap(), SecureProtocol::Cheetah);
        assert!(matches!(
            "SPDZ".parse::<SecureProtocol>(),
            Err(ClusterInitError::UnknownProtocol(_))
        ));
    }

    #[test]
    fn test_field_parsing() {
        assert_eq!("fm128".parse::<FieldType>().unwrap().bits(), 128);
        assert_eq!(FieldType::Fm64.to_string(), "FM64");
        assert!(matches!(
            "FM256".parse::<FieldType>(),
            Err(ClusterInitError::UnknownField(_))
        ));
    }

    #[test]
    fn test_psi_protocol_parsing() {
        assert_eq!("ecdh_psi_2pc".parse::<PsiProtocol>().unwrap(), PsiProtocol::Ecdh);
        assert!("RSA_PSI".parse::<PsiProtocol>().is_err());
    }
}
