//! SeaORM entity models

mod phrase;

pub use phrase::{
    ActiveModel as PhraseActiveModel,
    Column as PhraseColumn,
    Entity as PhraseEntity,
    Model as PhraseRow,
};
