mod archive;
mod constraints;
mod registry;
