//! Helpers for fully qualified module paths such as
//! `SN.node[0].ResourceManager.EnergySubsystem.EnergyStorage.Batteries[0]`.

use super::error::AggregateError;

/// Node index: the integer inside the first pair of square brackets
pub fn node_index(module: &str) -> Result<i64, AggregateError> {
    let missing = || AggregateError::MissingNodeIndex {
        module: module.to_string(),
    };

    let open = module.find('[').ok_or_else(missing)?;
    let close = module[open..].find(']').ok_or_else(missing)? + open;
    module[open + 1..close].trim().parse().map_err(|_| missing())
}

/// Short module name: the segment after the last period
pub fn short_name(module: &str) -> &str {
    module.rsplit('.').next().unwrap_or(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_index_uses_first_brackets() {
        assert_eq!(
            node_index("SN.node[12].ResourceManager.EnergySubsystem.EnergyStorage.Batteries[0]").unwrap(),
            12
        );
        assert_eq!(node_index("SN.node[0].Communication.MAC").unwrap(), 0);
    }

    #[test]
    fn test_node_index_missing() {
        assert!(node_index("SN.wirelessChannel").is_err());
        assert!(node_index("SN.node[x].Radio").is_err());
        assert!(node_index("SN.node[3.Radio").is_err());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("SN.node[3].Communication.MAC"), "MAC");
        assert_eq!(short_name("Radio"), "Radio");
    }
}
