mod engine_flow;
mod gemini_oracle;
