pub mod ledger;
pub mod model;
pub mod render;
pub mod statement;

pub use self::model::issuer::*;
pub use self::model::officer::*;
pub use self::model::recordkeeping::*;
pub use self::model::restriction::*;
pub use self::model::security::*;
pub use self::model::shareholder::*;
pub use self::model::tx::*;
pub use self::model::RecordId;
