use serde::Serialize;
use std::{convert::Infallible, fmt, str::FromStr};

/// Tuya data center region, used to pick the object storage host of a bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Region {
    #[default]
    EuCentral1,
    EuWest1,
    CnShanghai,
    CnBeijing,
    ApSouth1,
    ApSoutheast1,
    UsEast1,
    UsWest1,
    Other(String),
}

impl Region {
    pub const KNOWN: [Region; 8] = [
        Region::EuCentral1,
        Region::EuWest1,
        Region::CnShanghai,
        Region::CnBeijing,
        Region::ApSouth1,
        Region::ApSoutheast1,
        Region::UsEast1,
        Region::UsWest1,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::EuCentral1 => "eu-central-1",
            Self::EuWest1 => "eu-west-1",
            Self::CnShanghai => "cn-shanghai",
            Self::CnBeijing => "cn-beijing",
            Self::ApSouth1 => "ap-south-1",
            Self::ApSoutheast1 => "ap-southeast-1",
            Self::UsEast1 => "us-east-1",
            Self::UsWest1 => "us-west-1",
            Self::Other(x) => x,
        }
    }

    /// Object storage host serving buckets of this region.
    /// Unknown regions have no host.
    pub fn storage_host(&self) -> Option<&'static str> {
        Some(match self {
            Self::EuCentral1 => "oss-eu-central-1.aliyuncs.com",
            Self::EuWest1 => "oss-eu-west-1.aliyuncs.com",
            Self::CnShanghai => "oss-cn-shanghai.aliyuncs.com",
            Self::CnBeijing => "oss-cn-beijing.aliyuncs.com",
            Self::ApSouth1 => "oss-ap-south-1.aliyuncs.com",
            Self::ApSoutheast1 => "oss-ap-southeast-1.aliyuncs.com",
            Self::UsEast1 => "oss-us-east-1.aliyuncs.com",
            Self::UsWest1 => "oss-us-west-1.aliyuncs.com",
            Self::Other(_) => return None,
        })
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl FromStr for Region {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() {
            return Ok(Self::default());
        }

        Ok(Self::KNOWN
            .into_iter()
            .find(|x| x.as_str().eq_ignore_ascii_case(s))
            .unwrap_or_else(|| Self::Other(s.to_owned())))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Region {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known() {
        for region in Region::KNOWN {
            assert_eq!(region.as_str().parse::<Region>().unwrap(), region);
            assert!(region.storage_host().unwrap().contains(region.as_str()));
        }
        assert_eq!("US-WEST-1".parse::<Region>().unwrap(), Region::UsWest1);
    }

    #[test]
    fn test_default_region() {
        assert_eq!(Region::default(), Region::EuCentral1);
        assert_eq!("".parse::<Region>().unwrap(), Region::EuCentral1);
    }

    #[test]
    fn test_unknown_region_has_no_host() {
        let region = "mars-north-1".parse::<Region>().unwrap();
        assert_eq!(region, Region::Other("mars-north-1".to_owned()));
        assert!(!region.is_known());
        assert_eq!(region.storage_host(), None);
        assert_eq!(region.to_string(), "mars-north-1");
    }

    #[test]
    fn test_serialize() {
        assert_eq!(
            serde_json::to_string(&Region::CnBeijing).unwrap(),
            "\"cn-beijing\""
        );
    }
}
