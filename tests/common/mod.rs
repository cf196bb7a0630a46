#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use retail_scrub::config::RunConfig;
use tempfile::{TempDir, tempdir};

pub const CUSTOMERS_CSV: &str = "\
CustomerID,Name,Region,JoinDate,LoyaltyPoints,EngagementStyle
1001,Ann Lee,east,2024-01-05,120,Mobile
1002,Raj Patel,South West,01/20/2024,,kiosk
1003,Mia Chen,WEST,2024-02-11,80,
1001,Ann Lee,east,2024-01-05,120,Mobile
1004,Tom Ortiz,Atlantis,2024-03-02,60,Tablet
";

pub const PRODUCTS_CSV: &str = "\
ProductID,ProductName,Category,UnitPrice
7,Laptop,Electronics,$799.99
8,Hoodie,,39.5
9,Cable,Electronics,4.999
";

pub const SALES_CSV: &str = "\
TransactionID,SaleDate,CustomerID,ProductID,StoreID,CampaignID,SaleAmount,DiscountPercent,PaymentMethod
5,2025-01-31,12,7,401,,99.99,10,Card
6,2025-02-01,1001,8,402,0,39.50,,Cash
7,2025-02-02,1002,9,?,1,5.00,0,Card
8,2025-02-03,1003,7,403,2,799.99,150,PayPal
";

/// Scratch project root with a `data/raw` directory, cleaned up on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        let temp_dir = tempdir().expect("temp dir");
        fs::create_dir_all(temp_dir.path().join("data").join("raw")).expect("create raw dir");
        Self { temp_dir }
    }

    /// Workspace with the three sample extracts already in place.
    pub fn with_samples() -> Self {
        let workspace = Self::new();
        workspace.write_raw("customers.csv", CUSTOMERS_CSV);
        workspace.write_raw("products.csv", PRODUCTS_CSV);
        workspace.write_raw("sales.csv", SALES_CSV);
        workspace
    }

    /// Returns the project root owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> RunConfig {
        RunConfig::with_root(self.path())
    }

    /// Writes `contents` into `data/raw/{name}` and returns the path.
    pub fn write_raw(&self, name: &str, contents: &str) -> PathBuf {
        self.write(&format!("data/raw/{name}"), contents)
    }

    /// Writes `contents` relative to the workspace root and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn prepared_path(&self, name: &str) -> PathBuf {
        self.path().join("data").join("prepared").join(name)
    }

    /// Reads `data/prepared/{name}` as a string.
    pub fn read_prepared(&self, name: &str) -> String {
        fs::read_to_string(self.prepared_path(name)).expect("read prepared file")
    }

    pub fn read_report(&self, name: &str) -> serde_json::Value {
        serde_json::from_str(&self.read_prepared(name)).expect("parse report json")
    }
}
