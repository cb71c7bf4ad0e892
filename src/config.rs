/// Which master reply format the read path asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadProtocol {
    /// Structured reply carrying typed replica locations.
    #[default]
    Modern,
    /// Flat (ip, port) list, standard replicas only.
    Legacy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocatorConfig {
    pub read_protocol: ReadProtocol,
}

impl LocatorConfig {
    pub fn legacy() -> Self {
        Self {
            read_protocol: ReadProtocol::Legacy,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn modern_by_default() {
        assert_eq!(LocatorConfig::default().read_protocol, ReadProtocol::Modern);
        assert_eq!(LocatorConfig::legacy().read_protocol, ReadProtocol::Legacy);
    }
}
