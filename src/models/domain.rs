use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A synchronized business domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Categories,
    Locations,
    Partners,
    Employees,
    Products,
    Stock,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Categories,
        Domain::Locations,
        Domain::Partners,
        Domain::Employees,
        Domain::Products,
        Domain::Stock,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Domain::Categories => "categories",
            Domain::Locations => "locations",
            Domain::Partners => "partners",
            Domain::Employees => "employees",
            Domain::Products => "products",
            Domain::Stock => "stock",
        }
    }

    /// Execution stage in a full run. Domains of the same stage are
    /// independent; a stage only starts after every earlier stage finished.
    ///
    /// Products reference categories, and stock levels reference both
    /// products and locations.
    pub fn stage(self) -> u8 {
        match self {
            Domain::Categories | Domain::Locations | Domain::Partners | Domain::Employees => 0,
            Domain::Products => 1,
            Domain::Stock => 2,
        }
    }

    /// Domains whose records this one references. A run of this domain is
    /// pointless when one of them failed.
    pub fn depends_on(self) -> &'static [Domain] {
        match self {
            Domain::Products => &[Domain::Categories],
            Domain::Stock => &[Domain::Products, Domain::Locations],
            _ => &[],
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "categories" | "category" | "groups" => Ok(Domain::Categories),
            "locations" | "location" => Ok(Domain::Locations),
            "partners" | "partner" => Ok(Domain::Partners),
            "employees" | "employee" => Ok(Domain::Employees),
            "products" | "product" => Ok(Domain::Products),
            "stock" => Ok(Domain::Stock),
            _ => Err(format!(
                "Invalid domain '{}'. Valid options: categories, locations, partners, employees, products, stock",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_display() {
        assert_eq!(format!("{}", Domain::Categories), "categories");
        assert_eq!(format!("{}", Domain::Stock), "stock");
    }

    #[test]
    fn test_domain_from_str() {
        assert_eq!(Domain::from_str("products").unwrap(), Domain::Products);
        assert_eq!(Domain::from_str("LOCATIONS").unwrap(), Domain::Locations);
        assert_eq!(Domain::from_str("groups").unwrap(), Domain::Categories);
    }

    #[test]
    fn test_domain_from_str_invalid() {
        assert!(Domain::from_str("invoices").is_err());
        assert!(Domain::from_str("").is_err());
    }

    #[test]
    fn test_stages_order_dependencies() {
        assert!(Domain::Categories.stage() < Domain::Products.stage());
        assert!(Domain::Products.stage() < Domain::Stock.stage());
        assert!(Domain::Locations.stage() < Domain::Stock.stage());
    }

    #[test]
    fn test_domain_json_roundtrip() {
        let json = serde_json::to_string(&Domain::Partners).unwrap();
        assert_eq!(json, "\"partners\"");
        let parsed: Domain = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Domain::Partners);
    }
}
