pub mod scoring; // Sketch similarity scoring engine
pub mod diagnostic; // Patch dump (auto in dev, SKETCH_TRACKER_DUMP_DIR in prod)
