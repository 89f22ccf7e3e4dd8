pub mod registrable;
