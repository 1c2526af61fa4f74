// CV document model, stable identities, structural diffing and the content source.

pub mod diff;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod normalize;
pub mod source;

pub use diff::{diff_documents, DiffResult};
pub use identity::ensure_ids;
pub use models::{BulletPoint, Column, CvDocument, Paragraph, Section, SubSection};
