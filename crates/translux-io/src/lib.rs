// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Translux IO
//!
//! File-facing services: the headerless Haar kernel coefficient format and
//! image decode/encode for texture-space inputs and frame captures.

pub mod image;
pub mod kernel_file;

pub use self::image::{decode_image, save_rgba_png, DecodedImage, ImageIoError, ImagePixels};
pub use self::kernel_file::{
    completed_rows, load_kernel_file, read_kernel_coefficients, write_kernel_file,
    KernelFileError, KernelFileReader, KernelFileWriter,
};
