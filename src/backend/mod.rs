/// The data boundary: async requests and folder import against the catalog
pub mod import;
pub mod requests;
