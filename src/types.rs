/// Body of a single fortune record, delimiters excluded.
/// Example: `You will be hungry again in one hour.`
pub type FortuneText = String;
/// Identifier of the image model recorded in PNG provenance metadata.
/// Example: `runwayml/stable-diffusion-v1-5`
pub type ModelId = String;
/// Keyword of a PNG text chunk.
/// Examples: `prompt`, `model_id`
pub type MetaKeyword = String;
/// Value of a PNG text chunk.
/// Example: `A fool and his money are soon partying.`
pub type MetaText = String;
