//! # docpart
//!
//! Stores schemaless, nested documents in relational tables and rebuilds
//! them on read.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! KvDocument
//!     ↓
//! [D2RTranslator]        → CollectionData (rows per doc part, parents first)
//!     ↓                     schema discovered in MetaCollection,
//!     ↓                     row ids from a ReservedIdGenerator
//! [physical writer]      → e.g. MemoryDocPartStore::write
//!     ↓
//! [physical reader]      → DocPartResult blocks, deepest table first
//!     ↓
//! [R2DTranslator]        → ToroDocument { did, root }
//! ```
//!
//! Every structural position of a document is one doc part table,
//! identified by a [`TableRef`]. A key that holds a sub-document in one
//! document and an array in another still maps to one table; the parent
//! row's `CHILD` flag records which shape each occurrence had.
//!
//! ## Usage
//!
//! ```rust
//! use docpart::{
//!     CollectionMetaInfo, D2RTranslator, IdentifierFactory, InMemoryReservedIdGenerator,
//!     KvDocument, KvValue, MemoryDocPartStore, MetaCollection, R2DTranslator,
//!     TranslationConfig,
//! };
//! use std::sync::Arc;
//!
//! let meta = CollectionMetaInfo::new(
//!     "db",
//!     Arc::new(MetaCollection::new("people")),
//!     Arc::new(InMemoryReservedIdGenerator::new()),
//!     IdentifierFactory::default(),
//! );
//! let doc = KvDocument::builder().put("name", KvValue::string("John")).build();
//!
//! let mut d2r = D2RTranslator::new(&meta, &TranslationConfig::default());
//! let did = d2r.translate(&doc).unwrap();
//!
//! let store = MemoryDocPartStore::new();
//! store.write(&d2r.into_collection_data());
//!
//! let output = R2DTranslator::new().translate(store.read(&[did])).unwrap();
//! assert_eq!(output.documents[0].root, doc);
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `kvdocument` | Document value model, JSON conversion |
//! | `table_ref` | Path identity of doc part tables |
//! | `meta` | Schema registry, identifiers, row ids |
//! | `d2r` | Document → rows |
//! | `r2d` | Rows → documents |
//! | `memory` | In-memory row store |
//! | `config` | Configuration loading |
//! | `logging` | Tracing subscriber setup |

pub mod config;
pub mod d2r;
pub mod kvdocument;
pub mod logging;
pub mod memory;
pub mod meta;
pub mod r2d;
pub mod table_ref;

pub use config::{Config, ConfigError, IdentifierConfig, LoggingConfig, TranslationConfig};
pub use d2r::{
    CellValue, ChildKind, CollectionData, D2RTranslator, DocPartData, DocPartRow,
    TranslationError,
};
pub use kvdocument::{KvArray, KvDocument, KvValue, MongoTimestamp, ObjectId, ToroDocument};
pub use memory::MemoryDocPartStore;
pub use meta::{
    CollectionMetaInfo, FieldType, IdGeneratorError, IdentifierError, IdentifierFactory,
    InMemoryReservedIdGenerator, MetaCollection, MetaDocPart, MetaField, MetaScalar,
    ReservedIdGenerator,
};
pub use r2d::{
    DocPartResult, DocPartResultRow, DocumentFailure, R2DTranslator, R2dError, R2dOutput,
    ReconstructionError,
};
pub use table_ref::TableRef;
