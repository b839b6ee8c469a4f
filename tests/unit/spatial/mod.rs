mod crs;
mod raster;
