//! Data models for erpsync

mod endpoint;
mod kind;
mod moves;
mod partner;
mod product;
mod reference;
mod remote;
mod stock;
mod sync_log;

pub use endpoint::Endpoint;
pub use kind::{RecordKind, ReferenceKind, SourceVersion};
pub use moves::{
    Attachment, EdiDocument, EdiRequest, Move, MoveState, MoveType, NewMove, NewMoveLine,
    PaymentState,
};
pub use partner::{CompanyType, NewPartner, Partner};
pub use product::{NewProduct, Product, ProductType, ProductUpdate, Tracking};
pub use reference::{Journal, NamedRef};
pub use remote::RemoteRecord;
pub use stock::{normalize_serial, Lot, NewLot, StockQuant};
pub use sync_log::SyncLogEntry;
