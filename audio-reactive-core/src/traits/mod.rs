pub mod input_driver;
