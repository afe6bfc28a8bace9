/// Directory under the storage root holding committed objects, laid out by key.
pub const OBJECTS_DIR_NAME: &str = "objects";

/// Directory under the storage root holding in-flight uploads.
pub const STAGING_DIR_NAME: &str = ".staging";

/// Directory under the storage root holding one JSON metadata file per object.
pub const METADATA_DIR_NAME: &str = "metadata";

/// Scheme used for signed download URLs issued by the local store.
pub const SIGNED_URL_SCHEME: &str = "healthrec-files";
