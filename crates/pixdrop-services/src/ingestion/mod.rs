mod gate;

pub use gate::IngestionGate;
